//! Error handling for dyncohort-store
//!
//! Wraps dyncohort-core ExError with store-specific helpers

use dyncohort_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error for an already applied migration
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create a matching query error; the evaluator recovers these
pub fn query_error(rule_id: i64, err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::QueryExecution)
        .with_op("matching_query")
        .with_rule_id(rule_id)
        .with_message(err.to_string())
}

/// Create a matching query error for placeholders with no bound value
pub fn unbound_parameters(rule_id: i64, names: &[String]) -> ExError {
    ExError::new(ExErrorKind::QueryExecution)
        .with_op("matching_query")
        .with_rule_id(rule_id)
        .with_message(format!("Unbound query parameters: {}", names.join(", ")))
}

/// Create a not found error for a rule
pub fn rule_not_found(rule_id: i64) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_op("load_rule")
        .with_rule_id(rule_id)
        .with_message(format!("Rule not found: {}", rule_id))
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
