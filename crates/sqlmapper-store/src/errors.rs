//! Error handling for sqlmapper-store
//!
//! Wraps sqlmapper-core OrmError with store-specific helpers

use rusqlite::ErrorCode;
use sqlmapper_core::errors::{OrmError, OrmErrorKind};

/// Result type alias using OrmError
pub type Result<T> = std::result::Result<T, OrmError>;

/// True if the engine reported the database as locked by another writer
pub fn is_locked(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) => {
            matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
                || msg
                    .as_deref()
                    .is_some_and(|m| m.contains("database is locked"))
        }
        _ => false,
    }
}

/// Create a database error from rusqlite::Error
///
/// Busy and locked conditions become `LockContention`; everything else is
/// `Persistence`.
pub fn from_rusqlite(err: rusqlite::Error) -> OrmError {
    let kind = if is_locked(&err) {
        OrmErrorKind::LockContention
    } else {
        OrmErrorKind::Persistence
    };
    OrmError::new(kind)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an error for a statement issued against a closed connection
pub fn closed_connection(tag: &str, operation: &str) -> OrmError {
    OrmError::new(OrmErrorKind::StatementState)
        .with_op(operation.to_string())
        .with_tag(tag.to_string())
        .with_message("connection was closed during the transaction")
}

/// Create a configuration error
pub fn config_error(reason: impl Into<String>) -> OrmError {
    OrmError::new(OrmErrorKind::Config)
        .with_op("config")
        .with_message(reason)
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> OrmError {
    OrmError::new(OrmErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
