use crate::clock;
use rusqlite::{params, Connection, Result};
use std::collections::HashMap;

/// Append-only log of time spent on a tracked host.
#[derive(Debug, Clone)]
pub struct UsageSession {
    pub id: Option<i64>,
    pub host_name: String,
    pub duration_secs: i64,
    pub was_blocked: bool,
    pub timestamp: i64,
}

impl UsageSession {
    pub fn new(host_name: &str, duration_secs: i64, was_blocked: bool) -> Self {
        Self {
            id: None,
            host_name: host_name.to_lowercase(),
            duration_secs,
            was_blocked,
            timestamp: clock::now_secs(),
        }
    }

    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO usage_sessions (host_name, duration_secs, was_blocked, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.host_name,
                self.duration_secs,
                self.was_blocked as i32,
                self.timestamp,
            ],
        )?;
        self.id = Some(conn.last_insert_rowid());
        Ok(())
    }

    /// Total seconds spent on `host_name` today.
    pub fn today_usage(conn: &Connection, host_name: &str, now: i64) -> Result<i64> {
        conn.query_row(
            "SELECT COALESCE(SUM(duration_secs), 0) FROM usage_sessions
             WHERE host_name = ?1 AND timestamp >= ?2",
            params![host_name.to_lowercase(), clock::day_start(now)],
            |row| row.get(0),
        )
    }

    /// Today's per-host usage totals.
    pub fn today_usage_by_host(conn: &Connection, now: i64) -> Result<HashMap<String, i64>> {
        let mut stmt = conn.prepare(
            "SELECT host_name, SUM(duration_secs) FROM usage_sessions
             WHERE timestamp >= ?1 GROUP BY host_name",
        )?;
        let rows = stmt.query_map(params![clock::day_start(now)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        rows.collect()
    }
}
