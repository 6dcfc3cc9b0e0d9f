//! Database connection management
//!
//! Provides utilities for opening and configuring SQLite connections

#![allow(clippy::result_large_err)]

use crate::config::ContextConfig;
use crate::errors::{from_rusqlite, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Open an in-memory SQLite database
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Configure a freshly opened connection
///
/// The key pragma must precede any other statement on an encrypted database.
pub fn configure(conn: &Connection, config: &ContextConfig) -> Result<()> {
    if let Some(secret) = &config.secret {
        conn.pragma_update(None, "key", secret.expose())
            .map_err(from_rusqlite)?;
    }

    // Contention is handled by the context's retry, not by the engine waiting
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(from_rusqlite)?;

    Ok(())
}

/// Current `PRAGMA user_version`
pub fn user_version(conn: &Connection) -> Result<i64> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(from_rusqlite)
}

/// Increment `PRAGMA user_version` by one
pub fn bump_user_version(conn: &Connection) -> Result<i64> {
    let next = user_version(conn)? + 1;
    conn.pragma_update(None, "user_version", next)
        .map_err(from_rusqlite)?;
    Ok(next)
}
