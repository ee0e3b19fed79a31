use serde::{Deserialize, Serialize};

use super::condition::ConditionRecord;
use crate::errors::{DynCohortError, Result};

/// Boolean operator joining a rule's conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Combinator::And => "AND",
            Combinator::Or => "OR",
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidCombinator` for anything other than AND/OR (case-insensitive)
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Combinator::And),
            "OR" => Ok(Combinator::Or),
            _ => Err(DynCohortError::InvalidCombinator {
                value: value.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Combinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dynamic rule driving membership of one cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub name: String,
    pub description: String,

    /// Cohort whose membership this rule manages
    pub cohort_id: i64,

    pub combinator: Combinator,
    pub enabled: bool,

    /// Set when a condition is broken or the last evaluation failed
    pub broken: bool,

    /// Apply membership changes as set operations without per-member events
    pub bulk_processing: bool,

    /// React to trigger events as well as batch runs
    pub realtime: bool,

    /// Conditions in sort order
    pub conditions: Vec<ConditionRecord>,

    pub time_created: i64,
    pub time_modified: i64,
}

impl Rule {
    /// Eligible for batch and real-time processing
    pub fn is_active(&self) -> bool {
        self.enabled && !self.broken
    }
}

/// Submitted rule definition, as produced by the rule form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    /// Existing rule to update, or None to create
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cohort_id: i64,
    #[serde(default)]
    pub combinator: Combinator,
    #[serde(default)]
    pub bulk_processing: bool,
    #[serde(default)]
    pub realtime: bool,
    /// Full condition list; conditions absent from it are deleted on save
    #[serde(default)]
    pub conditions: Vec<ConditionRecord>,
}

impl RuleDraft {
    pub fn new(name: impl Into<String>, cohort_id: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            cohort_id,
            combinator: Combinator::And,
            bulk_processing: false,
            realtime: false,
            conditions: Vec::new(),
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidRule` when the name is blank or the cohort id is not positive
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DynCohortError::InvalidRule {
                reason: "name cannot be empty".to_string(),
            });
        }
        if self.cohort_id <= 0 {
            return Err(DynCohortError::InvalidRule {
                reason: "a cohort must be selected".to_string(),
            });
        }
        Ok(())
    }
}
