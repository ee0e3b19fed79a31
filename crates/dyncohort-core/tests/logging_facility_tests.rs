#![allow(clippy::unwrap_used, clippy::expect_used)]

use dyncohort_core::errors::DynCohortError;
use dyncohort_core::logging_facility::test_capture::init_test_capture;
use dyncohort_core::{log_op_end, log_op_error, log_op_start, DomainEvent};
use dyncohort_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name, rule_id = 7);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].lifecycle(), Some(EVENT_START));
    assert_eq!(events[0].field("rule_id"), Some("7"));
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42, matched = 3);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1, "Should have exactly one end event");
    assert_eq!(events[0].lifecycle(), Some(EVENT_END));
    assert_eq!(events[0].field("duration_ms"), Some("42"));
    assert_eq!(events[0].field("matched"), Some("3"));
}

#[test]
fn test_log_op_error_includes_kind_and_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = DynCohortError::BrokenRuleEnable { rule_id: 4 };
    log_op_error!(op_name, err, duration_ms = 10);

    capture.assert_event_exists(op_name, EVENT_END_ERROR);
    let events = capture.events_for_op(op_name);
    assert_eq!(events[0].field("err.code"), Some("ERR_INVALID_STATE"));
    assert_eq!(events[0].field("err.kind"), Some("InvalidState"));
}

#[test]
fn test_boundary_ownership_single_start_end() {
    let capture = init_test_capture();
    let op_name = "test_boundary_ownership_unique_4";

    log_op_start!(op_name);
    log_op_end!(op_name, duration_ms = 1);

    let starts =
        capture.count_events(|e| e.op() == Some(op_name) && e.lifecycle() == Some(EVENT_START));
    let ends =
        capture.count_events(|e| e.op() == Some(op_name) && e.lifecycle() == Some(EVENT_END));
    assert_eq!(starts, 1);
    assert_eq!(ends, 1);
}

#[test]
fn test_domain_event_is_traced() {
    let capture = init_test_capture();

    DomainEvent::CohortMemberAdded {
        cohort_id: 9_001,
        user_id: 77,
    }
    .trace();

    let found: Vec<_> = capture
        .domain_events("cohort_member_added")
        .into_iter()
        .filter(|e| e.field("cohort_id") == Some("9001"))
        .collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].field("user_id"), Some("77"));
}
