use dyncohort_core_types::RequestId;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias using DynCohortError
pub type Result<T> = std::result::Result<T, DynCohortError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure surfaced by DynCohort maps onto one of these kinds. Each
/// kind carries a stable code used by the CLI exit path, the logging
/// macros and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Boundary validation
    InvalidInput,
    NotFound,
    AlreadyExists,

    // Rule lifecycle
    /// Requested transition is not allowed from the rule's current state
    InvalidState,
    /// A condition's configuration references something that no longer exists
    ConfigurationBroken,
    /// A stored condition names a kind that is not registered
    UnknownConditionKind,

    // Evaluation
    /// The composed matching query failed to run
    QueryExecution,

    // Integration/IO
    Persistence,
    Serialization,
    Io,
    InvalidConfig,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::InvalidState => "ERR_INVALID_STATE",
            ExErrorKind::ConfigurationBroken => "ERR_CONFIGURATION_BROKEN",
            ExErrorKind::UnknownConditionKind => "ERR_UNKNOWN_CONDITION_KIND",
            ExErrorKind::QueryExecution => "ERR_QUERY_EXECUTION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification plus the rule/condition context needed to explain a
/// failure without re-reading the store.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    rule_id: Option<i64>,
    condition_id: Option<i64>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
    missing_ids: Option<Vec<i64>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            rule_id: None,
            condition_id: None,
            request_id: None,
            message: String::new(),
            source: None,
            missing_ids: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn with_rule_id(mut self, rule_id: i64) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    pub fn with_condition_id(mut self, condition_id: i64) -> Self {
        self.condition_id = Some(condition_id);
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Ids that failed validation in a batch operation
    pub fn with_missing_ids(mut self, ids: Vec<i64>) -> Self {
        self.missing_ids = Some(ids);
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn rule_id(&self) -> Option<i64> {
        self.rule_id
    }

    pub fn condition_id(&self) -> Option<i64> {
        self.condition_id
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    pub fn missing_ids(&self) -> Option<&[i64]> {
        self.missing_ids.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(rule_id) = self.rule_id {
            write!(f, " (rule_id: {})", rule_id)?;
        }
        if let Some(condition_id) = self.condition_id {
            write!(f, " (condition_id: {})", condition_id)?;
        }
        if let Some(ids) = &self.missing_ids {
            write!(f, " (missing: {:?})", ids)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

// ========== End Error Facility ==========

/// Domain errors raised by rule and condition operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DynCohortError {
    #[error("Rule not found: {rule_id}")]
    RuleNotFound { rule_id: i64 },

    /// One or more ids in a batch request do not exist
    #[error("Rules not found: {rule_ids:?}")]
    RulesNotFound { rule_ids: Vec<i64> },

    #[error("Condition not found: {condition_id}")]
    ConditionNotFound { condition_id: i64 },

    #[error("Cohort not found: {cohort_id}")]
    CohortNotFound { cohort_id: i64 },

    #[error("Unknown condition kind: {kind}")]
    UnknownConditionKind { kind: String },

    /// Condition form validation failed; `errors` maps field name to message
    #[error("Invalid configuration for {kind} condition: {}", join_errors(.errors))]
    InvalidConditionConfig {
        kind: String,
        errors: BTreeMap<String, String>,
    },

    #[error("Invalid rule: {reason}")]
    InvalidRule { reason: String },

    #[error("Invalid combinator: {value}")]
    InvalidCombinator { value: String },

    /// Enabling a rule that has broken conditions or a failed evaluation
    #[error("Rule {rule_id} is broken and cannot be enabled")]
    BrokenRuleEnable { rule_id: i64 },

    #[error("Matching query failed for rule {rule_id}: {message}")]
    QueryExecution { rule_id: i64, message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn join_errors(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{}: {}", field, message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<DynCohortError> for ExError {
    fn from(err: DynCohortError) -> Self {
        let message = err.to_string();
        match err {
            DynCohortError::RuleNotFound { rule_id } => ExError::new(ExErrorKind::NotFound)
                .with_rule_id(rule_id)
                .with_message(message),

            DynCohortError::RulesNotFound { rule_ids } => ExError::new(ExErrorKind::NotFound)
                .with_missing_ids(rule_ids)
                .with_message("Rules not found"),

            DynCohortError::ConditionNotFound { condition_id } => {
                ExError::new(ExErrorKind::NotFound)
                    .with_condition_id(condition_id)
                    .with_message(message)
            }

            DynCohortError::CohortNotFound { .. } => {
                ExError::new(ExErrorKind::NotFound).with_message(message)
            }

            DynCohortError::UnknownConditionKind { .. } => {
                ExError::new(ExErrorKind::UnknownConditionKind).with_message(message)
            }

            DynCohortError::InvalidConditionConfig { .. }
            | DynCohortError::InvalidRule { .. }
            | DynCohortError::InvalidCombinator { .. } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(message)
            }

            DynCohortError::BrokenRuleEnable { rule_id } => {
                ExError::new(ExErrorKind::InvalidState)
                    .with_rule_id(rule_id)
                    .with_message(message)
            }

            DynCohortError::QueryExecution { rule_id, .. } => {
                ExError::new(ExErrorKind::QueryExecution)
                    .with_rule_id(rule_id)
                    .with_message(message)
            }

            DynCohortError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            DynCohortError::InvalidConfig { .. } => {
                ExError::new(ExErrorKind::InvalidConfig).with_message(message)
            }

            DynCohortError::Internal { .. } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to DynCohortError
impl From<serde_json::Error> for DynCohortError {
    fn from(err: serde_json::Error) -> Self {
        DynCohortError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        let cases = [
            (ExErrorKind::InvalidState, "ERR_INVALID_STATE"),
            (ExErrorKind::QueryExecution, "ERR_QUERY_EXECUTION"),
            (ExErrorKind::ConfigurationBroken, "ERR_CONFIGURATION_BROKEN"),
            (
                ExErrorKind::UnknownConditionKind,
                "ERR_UNKNOWN_CONDITION_KIND",
            ),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_rules_not_found_carries_missing_ids() {
        let err: ExError = DynCohortError::RulesNotFound {
            rule_ids: vec![4, 9],
        }
        .into();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
        assert_eq!(err.missing_ids(), Some(&[4_i64, 9][..]));
    }

    #[test]
    fn test_invalid_condition_config_lists_fields() {
        let mut errors = BTreeMap::new();
        errors.insert("courseid".to_string(), "Required".to_string());
        let err = DynCohortError::InvalidConditionConfig {
            kind: "course_completed".to_string(),
            errors,
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration for course_completed condition: courseid: Required"
        );
    }

    #[test]
    fn test_display_includes_rule_context() {
        let err = ExError::new(ExErrorKind::InvalidState)
            .with_op("toggle_rule")
            .with_rule_id(7)
            .with_message("broken");
        assert_eq!(
            err.to_string(),
            "[ERR_INVALID_STATE] in operation 'toggle_rule': broken (rule_id: 7)"
        );
    }
}
