use crate::constants::{MAX_FRICTION_DELAY_SECS, MAX_HOST_NAME_LEN, MINUTES_PER_DAY};
use crate::error::AppError;

/// Validate a host name as entered by the user.
///
/// Schemes and trailing slashes are tolerated (normalization strips them);
/// whitespace and empty input are not.
pub fn validate_host_name(host: &str) -> Result<(), AppError> {
    let err = |reason: &str| AppError::InvalidInput {
        field: "host_name",
        reason: reason.into(),
    };

    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(err("must not be empty"));
    }
    if trimmed.len() > MAX_HOST_NAME_LEN {
        return Err(err("too long"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(err("must not contain whitespace"));
    }
    if trimmed.contains('#') {
        return Err(err("must not contain '#'"));
    }
    // Host names are single-quoted into the elevated fallback script
    if trimmed.contains('\'') {
        return Err(err("must not contain quotes"));
    }
    Ok(())
}

/// Validate a schedule window minute (0..=1439).
pub fn validate_minute_of_day(minute: u32) -> Result<(), AppError> {
    if minute >= MINUTES_PER_DAY {
        return Err(AppError::InvalidInput {
            field: "minute_of_day",
            reason: format!("must be 0-{}", MINUTES_PER_DAY - 1),
        });
    }
    Ok(())
}

/// Validate days_of_week format (comma-separated day numbers 1-7, 1=Monday).
pub fn validate_days_of_week(days: &str) -> Result<(), AppError> {
    if days.is_empty() {
        return Err(AppError::InvalidInput {
            field: "days_of_week",
            reason: "at least one day required".into(),
        });
    }

    for part in days.split(',') {
        let day: u32 = part.trim().parse().map_err(|_| AppError::InvalidInput {
            field: "days_of_week",
            reason: format!("invalid day: '{}'", part.trim()),
        })?;

        if !(1..=7).contains(&day) {
            return Err(AppError::InvalidInput {
                field: "days_of_week",
                reason: format!("day must be 1-7, got {}", day),
            });
        }
    }
    Ok(())
}

/// Validate the configurable friction delay.
pub fn validate_friction_delay(secs: u16) -> Result<(), AppError> {
    if secs == 0 {
        return Err(AppError::InvalidInput {
            field: "friction_delay_secs",
            reason: "must be positive".into(),
        });
    }
    if secs > MAX_FRICTION_DELAY_SECS {
        return Err(AppError::InvalidInput {
            field: "friction_delay_secs",
            reason: format!("cannot exceed {} seconds", MAX_FRICTION_DELAY_SECS),
        });
    }
    Ok(())
}
