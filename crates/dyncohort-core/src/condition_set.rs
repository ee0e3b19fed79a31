//! Composition of a rule's conditions into one fragment
//!
//! Joins are concatenated in condition order, where clauses are wrapped in
//! parentheses and combined with the rule's combinator, and parameter maps
//! are merged. Every condition shares one [`CompositionContext`], so aliases
//! never collide and a clash while merging indicates a condition that bound
//! parameters outside the context.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::conditions::{Condition, ConditionRegistry, RuleScope};
use crate::errors::{DynCohortError, Result};
use crate::model::{Combinator, Rule};
use crate::sql::{CompositionContext, Fragment, Params};

/// Combine already-built fragments
///
/// An empty list yields a fragment matching nobody, for either combinator.
///
/// # Errors
///
/// Returns `Internal` when two fragments bind the same parameter alias, or
/// when the result references a placeholder none of them bound
pub fn compose(fragments: Vec<Fragment>, combinator: Combinator) -> Result<Fragment> {
    if fragments.is_empty() {
        return Ok(Fragment::never());
    }

    let mut joins: Vec<String> = Vec::new();
    let mut wheres: Vec<String> = Vec::with_capacity(fragments.len());
    let mut params = Params::new();

    for fragment in fragments {
        let (join, where_clause, fragment_params) = fragment.into_parts();
        if !join.trim().is_empty() {
            joins.push(join.trim().to_string());
        }
        wheres.push(format!("({})", where_clause.trim()));
        for (alias, value) in fragment_params {
            if params.contains_key(&alias) {
                return Err(DynCohortError::Internal {
                    message: format!("duplicate parameter alias '{}' while composing", alias),
                });
            }
            params.insert(alias, value);
        }
    }

    let glue = format!(" {} ", combinator.as_str());
    let composed = Fragment::new(joins.join(" "), wheres.join(&glue), params);
    let unbound = composed.unbound_placeholders();
    if !unbound.is_empty() {
        return Err(DynCohortError::Internal {
            message: format!("unbound placeholders while composing: {}", unbound.join(", ")),
        });
    }
    Ok(composed)
}

/// Per-condition summary used by the rule view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionSummary {
    pub id: Option<i64>,
    pub kind: String,
    pub name: String,
    pub description: String,
    pub broken: bool,
    pub broken_description: Option<String>,
}

/// A rule's conditions instantiated from the registry
#[derive(Debug)]
pub struct ConditionSet {
    scope: RuleScope,
    combinator: Combinator,
    conditions: Vec<(Option<i64>, Box<dyn Condition>)>,
}

impl ConditionSet {
    /// Instantiate every stored condition in sort order
    pub fn from_rule(rule: &Rule, registry: &ConditionRegistry) -> Self {
        let scope = RuleScope {
            rule_id: rule.id,
            cohort_id: rule.cohort_id,
        };
        let mut records: Vec<_> = rule.conditions.iter().collect();
        records.sort_by_key(|record| record.sort_order);
        let conditions = records
            .into_iter()
            .map(|record| (record.id, registry.instantiate(record, &scope)))
            .collect();
        Self {
            scope,
            combinator: rule.combinator,
            conditions,
        }
    }

    pub fn scope(&self) -> RuleScope {
        self.scope
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = &dyn Condition> {
        self.conditions.iter().map(|(_, condition)| condition.as_ref())
    }

    /// Positions (in sort order) of the conditions that are broken
    pub fn broken_conditions(&self, catalog: &dyn Catalog) -> Vec<usize> {
        self.conditions
            .iter()
            .enumerate()
            .filter(|(_, (_, condition))| condition.is_broken(catalog))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn is_broken(&self, catalog: &dyn Catalog) -> bool {
        self.conditions
            .iter()
            .any(|(_, condition)| condition.is_broken(catalog))
    }

    /// Union of the trigger events declared by every condition
    pub fn events(&self) -> BTreeSet<&'static str> {
        self.conditions
            .iter()
            .flat_map(|(_, condition)| condition.events().iter().copied())
            .collect()
    }

    pub fn listens_to(&self, event: &str) -> bool {
        self.conditions
            .iter()
            .any(|(_, condition)| condition.events().contains(&event))
    }

    /// Compose the fragments of every condition through one shared context
    ///
    /// # Errors
    ///
    /// Returns `Internal` on a parameter alias collision or an unbound
    /// placeholder
    pub fn compose(&self, ctx: &mut CompositionContext, catalog: &dyn Catalog) -> Result<Fragment> {
        let fragments = self
            .conditions
            .iter()
            .map(|(_, condition)| condition.get_sql(ctx, catalog))
            .collect();
        compose(fragments, self.combinator)
    }

    pub fn summaries(&self, catalog: &dyn Catalog) -> Vec<ConditionSummary> {
        self.conditions
            .iter()
            .map(|(id, condition)| {
                let broken = condition.is_broken(catalog);
                ConditionSummary {
                    id: *id,
                    kind: condition.kind().to_string(),
                    name: condition.name().to_string(),
                    description: condition.config_description(catalog),
                    broken,
                    broken_description: broken.then(|| condition.broken_description(catalog)),
                }
            })
            .collect()
    }
}
