//! DynCohort Core - rule condition composition kernel
//!
//! This crate provides the pure, I/O-free parts of dynamic cohort rules:
//! - SQL fragments and the per-pass alias/parameter generator
//! - The `Condition` contract, the kind registry and every built-in kind
//! - Stateless comparison strategies shared by the profile field kinds
//! - Composition of a rule's conditions into one matching query
//! - Rule and condition models, domain events, error and logging facilities

pub mod catalog;
pub mod condition_set;
pub mod conditions;
pub mod errors;
pub mod events;
pub mod logging_facility;
pub mod model;
pub mod sql;

// Re-export commonly used types
pub use catalog::{Catalog, MemoryCatalog};
pub use condition_set::{compose, ConditionSet, ConditionSummary};
pub use conditions::{Condition, ConditionRegistry, RuleScope, ValidationErrors};
pub use errors::{DynCohortError, ExError, ExErrorKind, Result};
pub use events::{DomainEvent, EventSink, RecordingEventSink};
pub use model::{Combinator, ConditionConfig, ConditionRecord, Rule, RuleDraft};
pub use sql::{matching_users_query, CompositionContext, Fragment, MatchingQuery, Params, SqlValue};
