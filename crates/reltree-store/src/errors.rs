//! Error handling for reltree-store
//!
//! Wraps reltree-core RtError with store-specific helpers

use reltree_core::errors::{RtError, RtErrorKind};

/// Result type alias using RtError
pub type Result<T> = std::result::Result<T, RtError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> RtError {
    RtError::new(RtErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> RtError {
    RtError::new(RtErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create a settings error (unreadable or invalid TOML)
pub fn settings_error(reason: impl Into<String>) -> RtError {
    RtError::new(RtErrorKind::InvalidArgument)
        .with_op("settings")
        .with_message(reason)
}

/// Create a version lookup error
pub fn version_not_found(entity: &str, record_id: &str, sequence: i64) -> RtError {
    RtError::new(RtErrorKind::NotFound)
        .with_op("set_version_active")
        .with_entity(entity)
        .with_record_id(record_id)
        .with_message(format!("No version {} stored", sequence))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> RtError {
    RtError::new(RtErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> RtError {
    RtError::new(RtErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
