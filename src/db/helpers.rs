// src/db/helpers.rs

use crate::db::Database;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Execute a database operation with proper lock handling and error mapping.
///
/// # Example
/// ```ignore
/// with_connection(&db, "load active blocks", |conn| {
///     HostBlock::find_active(conn)
/// })
/// ```
pub fn with_connection<F, T>(db: &Arc<Mutex<Database>>, operation: &str, f: F) -> Result<T, String>
where
    F: FnOnce(&Connection) -> rusqlite::Result<T>,
{
    let db = db.lock().map_err(|e| {
        log::error!("Failed to acquire database lock for {}: {}", operation, e);
        format!("Failed to {}", operation)
    })?;

    f(db.connection()).map_err(|e| {
        log::error!("Failed to {}: {}", operation, e);
        format!("Failed to {}", operation)
    })
}
