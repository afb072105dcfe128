use crate::clock;
use rusqlite::{params, Connection, Result};

/// A recurring time window during which a host should be blocked.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub id: Option<i64>,
    /// Normalized host name this schedule enforces.
    pub host_name: String,
    pub enabled: bool,
    /// Window start, minutes after midnight (0..=1439).
    pub start_minute: u32,
    /// Window end, exclusive, minutes after midnight (0..=1439).
    pub end_minute: u32,
    /// Comma-separated day numbers (1=Monday, 7=Sunday). E.g. "1,2,3,4,5".
    pub days_of_week: String,
    pub created_at: i64,
}

impl Schedule {
    pub fn new(host_name: &str, start_minute: u32, end_minute: u32, days_of_week: &str) -> Self {
        Self {
            id: None,
            host_name: host_name.to_lowercase(),
            enabled: true,
            start_minute,
            end_minute,
            days_of_week: days_of_week.to_string(),
            created_at: clock::now_secs(),
        }
    }

    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO schedules (host_name, enabled, start_minute, end_minute, days_of_week, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.host_name,
                self.enabled as i32,
                self.start_minute,
                self.end_minute,
                self.days_of_week,
                self.created_at,
            ],
        )?;
        self.id = Some(conn.last_insert_rowid());
        Ok(())
    }

    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            rusqlite::Error::InvalidParameterName("Cannot update unsaved schedule".to_string())
        })?;
        conn.execute(
            "UPDATE schedules
             SET host_name = ?1, enabled = ?2, start_minute = ?3, end_minute = ?4, days_of_week = ?5
             WHERE id = ?6",
            params![
                self.host_name,
                self.enabled as i32,
                self.start_minute,
                self.end_minute,
                self.days_of_week,
                id,
            ],
        )?;
        Ok(())
    }

    pub fn find_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, host_name, enabled, start_minute, end_minute, days_of_week, created_at
             FROM schedules ORDER BY start_minute",
        )?;
        let rows = stmt.query_map([], |row| Self::from_row(row))?;
        rows.collect()
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, host_name, enabled, start_minute, end_minute, days_of_week, created_at
             FROM schedules WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let rows = conn.execute("DELETE FROM schedules WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Whether this schedule covers the given ISO day (1=Monday, 7=Sunday).
    pub fn applies_to_day(&self, day: u32) -> bool {
        self.days_of_week
            .split(',')
            .filter_map(|s| s.trim().parse::<u32>().ok())
            .any(|d| d == day)
    }

    /// Whether `minute` falls inside the window. The end is exclusive, and a
    /// window with `end <= start` never activates (overnight windows are a
    /// known unsupported configuration, not wrap-around).
    pub fn is_minute_in_window(&self, minute: u32) -> bool {
        self.start_minute <= minute && minute < self.end_minute
    }

    pub fn should_be_active(&self, day: u32, minute: u32) -> bool {
        self.enabled && self.applies_to_day(day) && self.is_minute_in_window(minute)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            host_name: row.get(1)?,
            enabled: row.get::<_, i32>(2)? != 0,
            start_minute: row.get(3)?,
            end_minute: row.get(4)?,
            days_of_week: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
