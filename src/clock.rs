//! Wall-clock helpers shared by the engines and the ledger queries.
//!
//! All timestamps are unix seconds; day-of-week and minute-of-day are
//! derived with epoch arithmetic (the epoch was a Thursday).

use crate::constants::SECS_PER_DAY;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Midnight (UTC) of the day containing `now`.
pub fn day_start(now: i64) -> i64 {
    now - now.rem_euclid(SECS_PER_DAY)
}

/// ISO day of week (1=Monday, 7=Sunday) and minute of day (0..1439) for `now`.
pub fn weekday_and_minute(now: i64) -> (u32, u32) {
    let days_since_epoch = now.div_euclid(SECS_PER_DAY);
    let weekday = (days_since_epoch + 3).rem_euclid(7) + 1;

    let secs_today = now.rem_euclid(SECS_PER_DAY);
    let minute = (secs_today / 60) as u32;

    (weekday as u32, minute)
}
