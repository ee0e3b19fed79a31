#![allow(clippy::unwrap_used, clippy::expect_used)]

// Integration tests for rule evaluation and membership reconciliation.

mod common;

use common::{add_members, auth, completed, draft, enabled_rule, members, setup, TARGET};
use dyncohort_core::errors::ExErrorKind;
use dyncohort_core::Combinator;
use dyncohort_engine::{evaluate_rule, EvaluationStatus};
use dyncohort_store::{RuleRepo, SqliteEventLog};
use proptest::prelude::*;

#[test]
fn test_evaluate_adds_matching_users() {
    let mut fx = setup();
    let rule_id =
        enabled_rule(&mut fx.engine, &draft(TARGET, Combinator::And, vec![auth("manual")]));
    fx.events.clear();

    let outcome = evaluate_rule(&mut fx.engine, rule_id).unwrap();

    assert_eq!(outcome.status, EvaluationStatus::Applied);
    assert_eq!(outcome.matched_count, 2);
    assert_eq!(outcome.added, 2);
    assert_eq!(outcome.removed, 0);
    assert_eq!(members(&fx.engine, TARGET), vec![1, 3]);
    assert_eq!(fx.events.count("cohort_member_added"), 2);
}

#[test]
fn test_evaluate_removes_members_that_no_longer_match() {
    let mut fx = setup();
    add_members(&fx.engine, TARGET, &[2, 3, 4]);
    let rule_id =
        enabled_rule(&mut fx.engine, &draft(TARGET, Combinator::And, vec![auth("manual")]));
    fx.events.clear();

    let outcome = evaluate_rule(&mut fx.engine, rule_id).unwrap();

    assert_eq!((outcome.added, outcome.removed), (1, 2));
    assert_eq!(members(&fx.engine, TARGET), vec![1, 3]);
    assert_eq!(fx.events.count("cohort_member_removed"), 2);
}

#[test]
fn test_repeated_evaluation_is_idempotent() {
    let mut fx = setup();
    let rule_id = enabled_rule(&mut fx.engine, &draft(TARGET, Combinator::And, vec![auth("ldap")]));

    evaluate_rule(&mut fx.engine, rule_id).unwrap();
    let first = members(&fx.engine, TARGET);
    fx.events.clear();
    let second = evaluate_rule(&mut fx.engine, rule_id).unwrap();

    assert_eq!(first, vec![2, 4]);
    assert_eq!(members(&fx.engine, TARGET), first);
    assert_eq!((second.added, second.removed), (0, 0));
    assert_eq!(second.matched_count, 2);
    assert!(fx.events.events().is_empty());
}

#[test]
fn test_combinators_over_disjoint_sets() {
    let mut fx = setup();
    let conditions = || vec![auth("ldap"), completed(2)];
    let and_rule = enabled_rule(&mut fx.engine, &draft(TARGET, Combinator::And, conditions()));
    let or_rule = enabled_rule(&mut fx.engine, &draft(22, Combinator::Or, conditions()));

    evaluate_rule(&mut fx.engine, and_rule).unwrap();
    evaluate_rule(&mut fx.engine, or_rule).unwrap();

    assert!(members(&fx.engine, TARGET).is_empty());
    assert_eq!(members(&fx.engine, 22), vec![1, 2, 3, 4]);
}

#[test]
fn test_rule_without_conditions_matches_nobody() {
    let mut fx = setup();
    add_members(&fx.engine, TARGET, &[1, 2]);
    let rule_id = enabled_rule(&mut fx.engine, &draft(TARGET, Combinator::And, vec![]));

    let outcome = evaluate_rule(&mut fx.engine, rule_id).unwrap();

    assert_eq!(outcome.matched_count, 0);
    assert_eq!(outcome.removed, 2);
    assert!(members(&fx.engine, TARGET).is_empty());
}

#[test]
fn test_bulk_mode_emits_no_member_events() {
    let mut fx = setup();
    add_members(&fx.engine, TARGET, &[2, 4]);
    let mut rule = draft(TARGET, Combinator::And, vec![auth("manual")]);
    rule.bulk_processing = true;
    let rule_id = enabled_rule(&mut fx.engine, &rule);
    fx.events.clear();

    let outcome = evaluate_rule(&mut fx.engine, rule_id).unwrap();

    assert_eq!((outcome.added, outcome.removed), (2, 2));
    assert_eq!(members(&fx.engine, TARGET), vec![1, 3]);
    assert_eq!(fx.events.count("cohort_member_added"), 0);
    assert_eq!(fx.events.count("cohort_member_removed"), 0);
}

#[test]
fn test_query_failure_flags_rule_and_keeps_members() {
    let mut fx = setup();
    let rule_id = enabled_rule(&mut fx.engine, &draft(TARGET, Combinator::And, vec![completed(2)]));
    evaluate_rule(&mut fx.engine, rule_id).unwrap();
    assert_eq!(members(&fx.engine, TARGET), vec![1, 3]);

    fx.engine
        .conn()
        .execute_batch("DROP TABLE course_completions")
        .unwrap();
    fx.events.clear();
    let outcome = evaluate_rule(&mut fx.engine, rule_id).unwrap();

    assert_eq!(outcome.status, EvaluationStatus::QueryFailed);
    assert_eq!(outcome.matched_count, 0);
    assert_eq!(members(&fx.engine, TARGET), vec![1, 3]);
    let rule = RuleRepo::require_rule(fx.engine.conn(), rule_id).unwrap();
    assert!(rule.broken);
    assert!(!rule.enabled);
    assert_eq!(fx.events.names(), vec!["matching_failed"]);
    let logged = SqliteEventLog::new(fx.engine.conn())
        .count("matching_failed")
        .unwrap();
    assert_eq!(logged, 1);
}

#[test]
fn test_broken_condition_leaves_membership_untouched() {
    let mut fx = setup();
    add_members(&fx.engine, TARGET, &[4]);
    let rule_id = enabled_rule(&mut fx.engine, &draft(TARGET, Combinator::Or, vec![completed(2)]));
    fx.engine
        .conn()
        .execute("UPDATE course SET enablecompletion = 0 WHERE id = 2", [])
        .unwrap();

    let outcome = evaluate_rule(&mut fx.engine, rule_id).unwrap();

    assert_eq!(outcome.status, EvaluationStatus::Broken);
    assert_eq!(members(&fx.engine, TARGET), vec![4]);
    assert!(RuleRepo::require_rule(fx.engine.conn(), rule_id).unwrap().broken);
}

#[test]
fn test_evaluate_unknown_rule_is_not_found() {
    let mut fx = setup();
    let err = evaluate_rule(&mut fx.engine, 404).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert_eq!(err.rule_id(), Some(404));
}

#[test]
fn test_deleted_users_never_join() {
    let mut fx = setup();
    let rule_id = enabled_rule(&mut fx.engine, &draft(TARGET, Combinator::And, vec![completed(2)]));
    evaluate_rule(&mut fx.engine, rule_id).unwrap();
    assert!(!members(&fx.engine, TARGET).contains(&5));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_bulk_and_per_user_reach_same_membership(
        initial in prop::collection::btree_set(1i64..=5, 0..=5),
        method in prop::sample::select(vec!["manual", "ldap"]),
    ) {
        let initial: Vec<i64> = initial.into_iter().collect();
        let mut finals = Vec::new();
        let mut member_events = Vec::new();
        for bulk in [false, true] {
            let mut fx = setup();
            add_members(&fx.engine, TARGET, &initial);
            let mut rule = draft(TARGET, Combinator::And, vec![auth(method)]);
            rule.bulk_processing = bulk;
            let rule_id = enabled_rule(&mut fx.engine, &rule);
            fx.events.clear();
            evaluate_rule(&mut fx.engine, rule_id).unwrap();
            finals.push(members(&fx.engine, TARGET));
            member_events.push(
                fx.events.count("cohort_member_added") + fx.events.count("cohort_member_removed"),
            );
        }
        prop_assert_eq!(&finals[0], &finals[1]);
        prop_assert_eq!(member_events[1], 0);
    }
}
