#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::BTreeSet;

use common::{configured_conditions, fixture_catalog, rule};
use dyncohort_core::{
    matching_users_query, Combinator, CompositionContext, ConditionConfig, ConditionRecord,
    ConditionRegistry, ConditionSet,
};
use proptest::prelude::*;

fn custom_field_condition(value: &str) -> ConditionRecord {
    ConditionRecord::new(
        "user_custom_profile",
        ConditionConfig::new()
            .with("profilefield", "pets")
            .with("pets_operator", 2)
            .with("pets_value", value),
    )
}

proptest! {
    #[test]
    fn prop_same_kind_conditions_never_share_aliases(n in 2usize..8, or in any::<bool>()) {
        let combinator = if or { Combinator::Or } else { Combinator::And };
        let records = (0..n).map(|i| custom_field_condition(if i % 2 == 0 { "Cats" } else { "Dogs" })).collect();
        let set = ConditionSet::from_rule(&rule(combinator, records), &ConditionRegistry::with_defaults());
        let mut ctx = CompositionContext::new(0);
        let fragment = set.compose(&mut ctx, &fixture_catalog()).unwrap();

        // Each condition binds the field id plus four multiselect patterns
        prop_assert_eq!(fragment.params().len(), n * 5);
        prop_assert!(fragment.unbound_placeholders().is_empty());

        let joins: Vec<&str> = fragment.join().split("LEFT JOIN").filter(|j| !j.trim().is_empty()).collect();
        prop_assert_eq!(joins.len(), n);
        let aliases: BTreeSet<&str> = joins
            .iter()
            .filter_map(|j| j.split_whitespace().nth(1))
            .collect();
        prop_assert_eq!(aliases.len(), n);
    }

    #[test]
    fn prop_where_clause_has_one_group_per_condition(n in 1usize..6) {
        let records = (0..n)
            .map(|_| ConditionRecord::new("user_last_login", ConditionConfig::new().with("operator", 1)))
            .collect();
        let set = ConditionSet::from_rule(&rule(Combinator::Or, records), &ConditionRegistry::with_defaults());
        let mut ctx = CompositionContext::new(0);
        let fragment = set.compose(&mut ctx, &fixture_catalog()).unwrap();
        prop_assert_eq!(fragment.where_clause().matches(" OR ").count(), n - 1);
        prop_assert_eq!(fragment.where_clause().matches('(').count(), n);
    }
}

#[test]
fn test_every_kind_composes_into_one_fully_bound_query() {
    let set = ConditionSet::from_rule(
        &rule(Combinator::And, configured_conditions()),
        &ConditionRegistry::with_defaults(),
    );
    let catalog = fixture_catalog();
    assert!(!set.is_broken(&catalog));

    let mut ctx = CompositionContext::new(1_700_000_000);
    let fragment = set.compose(&mut ctx, &catalog).unwrap();
    assert!(fragment.unbound_placeholders().is_empty());

    let query = matching_users_query(&fragment, &mut ctx, Some(42));
    assert!(query.sql.starts_with("SELECT DISTINCT u.id FROM users u LEFT JOIN"));
    assert!(query.sql.ends_with("ORDER BY u.id"));
    assert_eq!(query.params.len(), fragment.params().len() + 1);
}

#[test]
fn test_empty_rule_matches_nobody_for_both_combinators() {
    for combinator in [Combinator::And, Combinator::Or] {
        let set = ConditionSet::from_rule(
            &rule(combinator, Vec::new()),
            &ConditionRegistry::with_defaults(),
        );
        let mut ctx = CompositionContext::new(0);
        assert!(set.compose(&mut ctx, &fixture_catalog()).unwrap().is_never());
    }
}

#[test]
fn test_unknown_kind_marks_the_set_broken() {
    let mut records = configured_conditions();
    records.push(ConditionRecord::new("retired_kind", ConditionConfig::new()));
    let set = ConditionSet::from_rule(
        &rule(Combinator::Or, records),
        &ConditionRegistry::with_defaults(),
    );
    let catalog = fixture_catalog();
    assert!(set.is_broken(&catalog));
    assert_eq!(set.broken_conditions(&catalog), vec![set.len() - 1]);
}
