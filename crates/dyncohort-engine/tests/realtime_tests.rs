#![allow(clippy::unwrap_used, clippy::expect_used)]

// Integration tests for event-driven re-evaluation.

mod common;

use common::{auth, draft, enabled_rule, members, setup, setup_with, TARGET};
use dyncohort_core::{Combinator, ConditionConfig, RuleDraft};
use dyncohort_engine::{evaluate_rule, handle_event, EvaluationStatus, Settings};
use dyncohort_store::RuleRepo;

fn realtime(mut draft: RuleDraft) -> RuleDraft {
    draft.realtime = true;
    draft
}

#[test]
fn test_trigger_only_touches_acting_user() {
    let mut fx = setup();
    enabled_rule(&mut fx.engine, &realtime(draft(TARGET, Combinator::And, vec![auth("manual")])));

    let outcome = handle_event(&mut fx.engine, "user_updated", 1);

    assert_eq!(outcome.evaluated.len(), 1);
    assert_eq!(outcome.evaluated[0].added, 1);
    assert_eq!(members(&fx.engine, TARGET), vec![1]);
}

#[test]
fn test_trigger_removes_user_who_stopped_matching() {
    let mut fx = setup();
    let rule_id = enabled_rule(
        &mut fx.engine,
        &realtime(draft(TARGET, Combinator::And, vec![auth("manual")])),
    );
    evaluate_rule(&mut fx.engine, rule_id).unwrap();
    fx.engine
        .conn()
        .execute("UPDATE users SET auth = 'ldap' WHERE id = 1", [])
        .unwrap();
    fx.events.clear();

    let outcome = handle_event(&mut fx.engine, "user_updated", 1);

    assert_eq!(outcome.evaluated[0].removed, 1);
    assert_eq!(members(&fx.engine, TARGET), vec![3]);
    assert_eq!(fx.events.names(), vec!["cohort_member_removed"]);
}

#[test]
fn test_unrelated_event_is_ignored() {
    let mut fx = setup();
    enabled_rule(&mut fx.engine, &realtime(draft(TARGET, Combinator::And, vec![auth("manual")])));

    let outcome = handle_event(&mut fx.engine, "user_loggedin", 1);

    assert!(outcome.evaluated.is_empty());
    assert!(members(&fx.engine, TARGET).is_empty());
}

#[test]
fn test_global_switch_disables_triggers() {
    let mut settings = Settings::default();
    settings.realtime = false;
    let mut fx = setup_with(settings);
    enabled_rule(&mut fx.engine, &realtime(draft(TARGET, Combinator::And, vec![auth("manual")])));

    let outcome = handle_event(&mut fx.engine, "user_updated", 1);

    assert!(outcome.evaluated.is_empty());
    assert!(members(&fx.engine, TARGET).is_empty());
}

#[test]
fn test_rule_without_realtime_flag_is_batch_only() {
    let mut fx = setup();
    enabled_rule(&mut fx.engine, &draft(TARGET, Combinator::And, vec![auth("manual")]));

    assert!(handle_event(&mut fx.engine, "user_updated", 1).evaluated.is_empty());
}

#[test]
fn test_disabled_rule_ignores_triggers() {
    let mut fx = setup();
    dyncohort_engine::save_rule(
        &mut fx.engine,
        &realtime(draft(TARGET, Combinator::And, vec![auth("manual")])),
    )
    .unwrap();

    assert!(handle_event(&mut fx.engine, "user_created", 1).evaluated.is_empty());
}

#[test]
fn test_query_failure_does_not_reach_caller() {
    let mut fx = setup();
    let login = ("user_last_login", ConditionConfig::new().with("operator", 1));
    let rule_id =
        enabled_rule(&mut fx.engine, &realtime(draft(TARGET, Combinator::And, vec![login])));
    fx.engine
        .conn()
        .execute_batch("ALTER TABLE users RENAME COLUMN lastaccess TO lastseen")
        .unwrap();

    let outcome = handle_event(&mut fx.engine, "user_loggedin", 1);

    assert_eq!(outcome.evaluated[0].status, EvaluationStatus::QueryFailed);
    assert!(outcome.failed.is_empty());
    assert!(RuleRepo::require_rule(fx.engine.conn(), rule_id).unwrap().broken);
    assert_eq!(fx.events.count("matching_failed"), 1);
}
