use crate::clock;
use crate::constants::SECS_PER_DAY;
use rusqlite::{params, Connection, Result};

/// One aggregate row per calendar day, created lazily and mutated only by
/// in-place increments so readers never observe a partial rewrite.
#[derive(Debug, Clone)]
pub struct DailyStats {
    pub id: Option<i64>,
    /// Midnight of the day this row covers (unix seconds).
    pub day_start: i64,
    pub bypass_count: i64,
    pub block_activation_count: i64,
    pub wasted_secs: i64,
}

impl DailyStats {
    /// Fetch today's row, creating a zeroed one if this is the first write.
    pub fn get_or_create_today(conn: &Connection, now: i64) -> Result<Self> {
        let day = clock::day_start(now);
        conn.execute(
            "INSERT OR IGNORE INTO daily_stats (day_start) VALUES (?1)",
            params![day],
        )?;
        Self::find_by_day(conn, day)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn find_by_day(conn: &Connection, day_start: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, day_start, bypass_count, block_activation_count, wasted_secs
             FROM daily_stats WHERE day_start = ?1",
        )?;
        let mut rows = stmt.query(params![day_start])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn increment_bypass(conn: &Connection, now: i64) -> Result<()> {
        Self::get_or_create_today(conn, now)?;
        conn.execute(
            "UPDATE daily_stats SET bypass_count = bypass_count + 1 WHERE day_start = ?1",
            params![clock::day_start(now)],
        )?;
        Ok(())
    }

    pub fn increment_block_activation(conn: &Connection, now: i64) -> Result<()> {
        Self::get_or_create_today(conn, now)?;
        conn.execute(
            "UPDATE daily_stats SET block_activation_count = block_activation_count + 1
             WHERE day_start = ?1",
            params![clock::day_start(now)],
        )?;
        Ok(())
    }

    pub fn add_wasted_secs(conn: &Connection, now: i64, secs: i64) -> Result<()> {
        Self::get_or_create_today(conn, now)?;
        conn.execute(
            "UPDATE daily_stats SET wasted_secs = wasted_secs + ?1 WHERE day_start = ?2",
            params![secs, clock::day_start(now)],
        )?;
        Ok(())
    }

    /// Rows for the last seven days, newest first.
    pub fn last_week(conn: &Connection, now: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, day_start, bypass_count, block_activation_count, wasted_secs
             FROM daily_stats WHERE day_start >= ?1 ORDER BY day_start DESC",
        )?;
        let since = clock::day_start(now) - 6 * SECS_PER_DAY;
        let rows = stmt.query_map(params![since], |row| Self::from_row(row))?;
        rows.collect()
    }

    fn from_row(row: &rusqlite::Row<'_>) -> Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            day_start: row.get(1)?,
            bypass_count: row.get(2)?,
            block_activation_count: row.get(3)?,
            wasted_secs: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{migrations, Database};
    use tempfile::{tempdir, TempDir};

    fn setup_db() -> (Database, TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        migrations::run(db.connection()).unwrap();
        (db, dir)
    }

    #[test]
    fn test_get_or_create_is_lazy_and_stable() {
        let (db, _dir) = setup_db();
        let conn = db.connection();
        let now = clock::now_secs();

        let first = DailyStats::get_or_create_today(conn, now).unwrap();
        assert_eq!(first.bypass_count, 0);
        assert_eq!(first.day_start, clock::day_start(now));

        let second = DailyStats::get_or_create_today(conn, now).unwrap();
        assert_eq!(first.id, second.id);

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM daily_stats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_increments() {
        let (db, _dir) = setup_db();
        let conn = db.connection();
        let now = clock::now_secs();

        DailyStats::increment_bypass(conn, now).unwrap();
        DailyStats::increment_bypass(conn, now).unwrap();
        DailyStats::increment_block_activation(conn, now).unwrap();
        DailyStats::add_wasted_secs(conn, now, 90).unwrap();

        let today = DailyStats::get_or_create_today(conn, now).unwrap();
        assert_eq!(today.bypass_count, 2);
        assert_eq!(today.block_activation_count, 1);
        assert_eq!(today.wasted_secs, 90);
    }

    #[test]
    fn test_last_week_excludes_older_rows() {
        let (db, _dir) = setup_db();
        let conn = db.connection();
        let now = clock::now_secs();

        DailyStats::increment_bypass(conn, now).unwrap();
        DailyStats::increment_bypass(conn, now - 3 * SECS_PER_DAY).unwrap();
        DailyStats::increment_bypass(conn, now - 10 * SECS_PER_DAY).unwrap();

        let week = DailyStats::last_week(conn, now).unwrap();
        assert_eq!(week.len(), 2);
        // Newest first
        assert!(week[0].day_start > week[1].day_start);
    }
}
