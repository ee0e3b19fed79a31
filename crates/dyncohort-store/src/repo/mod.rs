//! Repository layer for rules, conditions and cohort membership

pub mod cohort_repo;
pub mod rule_repo;

pub use cohort_repo::{CohortRepo, MANAGED_COMPONENT};
pub use rule_repo::{ConditionChanges, RuleRepo};
