//! Core types shared across the DynCohort crates
//!
//! - **Correlation types**: EvaluationId, RequestId
//! - **Schema constants**: Canonical field keys and event names used by the
//!   logging facility and the domain event log

pub mod correlation;
pub mod schema;

pub use correlation::{EvaluationId, RequestId};
