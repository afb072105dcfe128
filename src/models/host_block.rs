use crate::clock;
use rusqlite::{params, Connection, Result};

/// A single blocked host, manually activated or owned by a schedule.
///
/// Rows are deactivated rather than deleted; `expires_at == None` means the
/// block holds until it is explicitly removed.
#[derive(Debug, Clone)]
pub struct HostBlock {
    pub id: Option<i64>,
    /// Normalized host name: lowercase, no scheme, no trailing slash.
    pub host_name: String,
    pub is_active: bool,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub is_scheduled: bool,
    pub schedule_id: Option<i64>,
}

impl HostBlock {
    /// Create a manual block (not yet saved). `duration_secs == None` is permanent.
    pub fn new(host_name: &str, duration_secs: Option<i64>) -> Self {
        let now = clock::now_secs();
        Self {
            id: None,
            host_name: host_name.to_lowercase(),
            is_active: true,
            created_at: now,
            expires_at: duration_secs.map(|d| now + d),
            is_scheduled: false,
            schedule_id: None,
        }
    }

    /// Create a block owned by a schedule (not yet saved).
    pub fn new_scheduled(host_name: &str, schedule_id: i64) -> Self {
        Self {
            id: None,
            host_name: host_name.to_lowercase(),
            is_active: true,
            created_at: clock::now_secs(),
            expires_at: None,
            is_scheduled: true,
            schedule_id: Some(schedule_id),
        }
    }

    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO host_blocks (host_name, is_active, created_at, expires_at, is_scheduled, schedule_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.host_name,
                self.is_active as i32,
                self.created_at,
                self.expires_at,
                self.is_scheduled as i32,
                self.schedule_id,
            ],
        )?;
        self.id = Some(conn.last_insert_rowid());
        Ok(())
    }

    /// Mark the row inactive. The caller decides whether the resource
    /// mutation succeeded first; this only records the outcome.
    pub fn deactivate(&mut self, conn: &Connection) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            rusqlite::Error::InvalidParameterName("Cannot deactivate unsaved block".to_string())
        })?;
        conn.execute(
            "UPDATE host_blocks SET is_active = 0 WHERE id = ?1",
            params![id],
        )?;
        self.is_active = false;
        Ok(())
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let rows = conn.execute("DELETE FROM host_blocks WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, host_name, is_active, created_at, expires_at, is_scheduled, schedule_id
             FROM host_blocks WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// All active blocks, newest first.
    pub fn find_active(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, host_name, is_active, created_at, expires_at, is_scheduled, schedule_id
             FROM host_blocks WHERE is_active = 1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| Self::from_row(row))?;
        rows.collect()
    }

    /// Active blocks whose expiry has passed at `now`.
    pub fn find_expired(conn: &Connection, now: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, host_name, is_active, created_at, expires_at, is_scheduled, schedule_id
             FROM host_blocks
             WHERE is_active = 1 AND expires_at IS NOT NULL AND expires_at < ?1",
        )?;
        let rows = stmt.query_map(params![now], |row| Self::from_row(row))?;
        rows.collect()
    }

    /// Active blocks owned by schedules (for the sweep's liveness check).
    pub fn find_active_scheduled(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, host_name, is_active, created_at, expires_at, is_scheduled, schedule_id
             FROM host_blocks WHERE is_active = 1 AND is_scheduled = 1",
        )?;
        let rows = stmt.query_map([], |row| Self::from_row(row))?;
        rows.collect()
    }

    /// Substring-tolerant "is this host blocked" query.
    ///
    /// Matches in both directions with `www.` stripped, so partial-domain
    /// variants hit. Known to be loose for unrelated hosts sharing a
    /// substring; callers go through here so the rule can be tightened in
    /// one place.
    pub fn is_host_blocked(conn: &Connection, host_name: &str) -> Result<bool> {
        let clean = strip_www(&host_name.to_lowercase());
        let active = Self::find_active(conn)?;
        Ok(active.iter().any(|block| {
            let block_host = strip_www(&block.host_name);
            clean.contains(&block_host) || block_host.contains(&clean)
        }))
    }

    /// First active block matching `host_name` under the same tolerant rule.
    pub fn find_active_matching(conn: &Connection, host_name: &str) -> Result<Option<Self>> {
        let clean = strip_www(&host_name.to_lowercase());
        let active = Self::find_active(conn)?;
        Ok(active.into_iter().find(|block| {
            let block_host = strip_www(&block.host_name);
            clean.contains(&block_host) || block_host.contains(&clean)
        }))
    }

    pub fn is_expired(&self, now: i64) -> bool {
        match self.expires_at {
            Some(end) => now > end,
            None => false,
        }
    }

    pub fn remaining_secs(&self, now: i64) -> Option<i64> {
        self.expires_at.map(|end| (end - now).max(0))
    }

    fn from_row(row: &rusqlite::Row<'_>) -> Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            host_name: row.get(1)?,
            is_active: row.get::<_, i32>(2)? != 0,
            created_at: row.get(3)?,
            expires_at: row.get(4)?,
            is_scheduled: row.get::<_, i32>(5)? != 0,
            schedule_id: row.get(6)?,
        })
    }
}

fn strip_www(host: &str) -> String {
    host.strip_prefix("www.").unwrap_or(host).to_string()
}
