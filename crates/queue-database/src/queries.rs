//! Query helpers for the key-value store.

use crate::DatabaseResult;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

/// Get the raw value stored under `key`.
pub fn get_value(conn: &Connection, key: &str) -> DatabaseResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM key_value_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Insert or overwrite the value under `key`.
pub fn set_value(conn: &Connection, key: &str, value: &str) -> DatabaseResult<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO key_value_store (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
        params![key, value, now],
    )?;
    Ok(())
}

/// Delete the value under `key`. Returns whether a row was removed.
pub fn delete_value(conn: &Connection, key: &str) -> DatabaseResult<bool> {
    let count = conn.execute("DELETE FROM key_value_store WHERE key = ?1", params![key])?;
    Ok(count > 0)
}
