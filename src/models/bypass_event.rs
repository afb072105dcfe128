use crate::clock;
use crate::constants::SECS_PER_DAY;
use rusqlite::{params, Connection, Result};

/// How the user circumvented a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassType {
    /// Clicked through the extension's intervention page.
    InterventionPage,
    /// Completed the friction gate to disable a block.
    FrictionOverride,
}

impl BypassType {
    pub fn as_str(self) -> &'static str {
        match self {
            BypassType::InterventionPage => "intervention_page",
            BypassType::FrictionOverride => "friction_override",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "intervention_page" => Some(BypassType::InterventionPage),
            "friction_override" => Some(BypassType::FrictionOverride),
            _ => None,
        }
    }
}

/// Append-only record of a circumvention, kept for the shame stats.
#[derive(Debug, Clone)]
pub struct BypassEvent {
    pub id: Option<i64>,
    pub host_name: String,
    pub bypass_type: BypassType,
    pub timestamp: i64,
    pub reason_given: Option<String>,
}

impl BypassEvent {
    pub fn new(host_name: &str, bypass_type: BypassType, reason_given: Option<&str>) -> Self {
        Self {
            id: None,
            host_name: host_name.to_lowercase(),
            bypass_type,
            timestamp: clock::now_secs(),
            reason_given: reason_given.map(str::to_string),
        }
    }

    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO bypass_events (host_name, bypass_type, timestamp, reason_given)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.host_name,
                self.bypass_type.as_str(),
                self.timestamp,
                self.reason_given,
            ],
        )?;
        self.id = Some(conn.last_insert_rowid());
        Ok(())
    }

    pub fn count_since(conn: &Connection, since: i64) -> Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM bypass_events WHERE timestamp >= ?1",
            params![since],
            |row| row.get(0),
        )
    }

    pub fn today_count(conn: &Connection, now: i64) -> Result<i64> {
        Self::count_since(conn, clock::day_start(now))
    }

    pub fn week_count(conn: &Connection, now: i64) -> Result<i64> {
        Self::count_since(conn, now - 7 * SECS_PER_DAY)
    }
}
