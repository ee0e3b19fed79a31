//! DynCohort Store - SQLite persistence for dynamic cohort rules
//!
//! Provides:
//! - Connection helpers and an embedded, checksummed migrations framework
//! - Rule, condition and cohort membership repositories
//! - `SqliteCatalog`, the platform lookups conditions consult
//! - Execution of composed matching-user queries
//! - The persisted domain event log

pub mod catalog;
pub mod db;
pub mod errors;
pub mod event_log;
pub mod matching;
pub mod migrations;
pub mod repo;

// Re-export key types
pub use catalog::SqliteCatalog;
pub use errors::Result;
pub use event_log::SqliteEventLog;
pub use repo::{CohortRepo, RuleRepo};
