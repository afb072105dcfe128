use super::schema::SCHEMA;
use rusqlite::{Connection, Result};

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    seed_settings(conn)?;
    Ok(())
}

/// Settings are a singleton row; create it with defaults on first run.
fn seed_settings(conn: &Connection) -> Result<()> {
    let count: i32 = conn.query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))?;

    if count == 0 {
        conn.execute("INSERT INTO settings (id) VALUES (1)", [])?;
    }
    Ok(())
}
