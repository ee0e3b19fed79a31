#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;

use dyncohort_core::errors::{DynCohortError, ExError, ExErrorKind};

#[test]
fn test_not_found_variants_map_to_not_found() {
    let single: ExError = DynCohortError::RuleNotFound { rule_id: 3 }.into();
    assert_eq!(single.kind(), ExErrorKind::NotFound);
    assert_eq!(single.rule_id(), Some(3));

    let batch: ExError = DynCohortError::RulesNotFound {
        rule_ids: vec![8, 9],
    }
    .into();
    assert_eq!(batch.kind(), ExErrorKind::NotFound);
    assert_eq!(batch.missing_ids(), Some(&[8, 9][..]));
}

#[test]
fn test_enabling_broken_rule_is_invalid_state() {
    let err: ExError = DynCohortError::BrokenRuleEnable { rule_id: 2 }.into();
    assert_eq!(err.kind(), ExErrorKind::InvalidState);
    assert_eq!(err.code(), "ERR_INVALID_STATE");
}

#[test]
fn test_query_failure_keeps_rule_id() {
    let err: ExError = DynCohortError::QueryExecution {
        rule_id: 6,
        message: "no such table: foo".to_string(),
    }
    .into();
    assert_eq!(err.kind(), ExErrorKind::QueryExecution);
    assert_eq!(err.rule_id(), Some(6));
    assert!(err.to_string().contains("no such table"));
}

#[test]
fn test_invalid_condition_config_lists_fields() {
    let mut errors = BTreeMap::new();
    errors.insert("courseid".to_string(), "Required".to_string());
    errors.insert("operator".to_string(), "Invalid operator".to_string());
    let err = DynCohortError::InvalidConditionConfig {
        kind: "course_completed".to_string(),
        errors,
    };
    assert_eq!(
        err.to_string(),
        "Invalid configuration for course_completed condition: courseid: Required; operator: Invalid operator"
    );
    let ex: ExError = err.into();
    assert_eq!(ex.kind(), ExErrorKind::InvalidInput);
}

#[test]
fn test_display_includes_code_and_op() {
    let err = ExError::new(ExErrorKind::Persistence)
        .with_op("save_rule")
        .with_rule_id(12)
        .with_message("disk full");
    let rendered = err.to_string();
    assert!(rendered.starts_with("[ERR_PERSISTENCE] in operation 'save_rule': disk full"));
    assert!(rendered.contains("(rule_id: 12)"));
}
