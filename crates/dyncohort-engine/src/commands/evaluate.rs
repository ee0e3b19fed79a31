//! Rule evaluation and cohort membership reconciliation
//!
//! One pass composes the rule's conditions into a matching query, runs it,
//! and reconciles the cohort so that its members equal the matched users:
//! `to_add = matched - members`, `to_remove = members - matched`.
//!
//! A rule with broken conditions, or whose query fails, is flagged broken
//! and its membership is left untouched for the pass.
//!
//! ## Logging Policy
//!
//! `evaluate_rule` owns the boundary events (`log_op_start!` /
//! `log_op_end!` / `log_op_error!`). The shared `process_rule` step is also
//! used by batch and real-time processing and only traces at debug/warn.

use std::collections::BTreeSet;
use std::time::Instant;

use dyncohort_core::errors::{ExError, ExErrorKind};
use dyncohort_core::{
    log_op_end, log_op_error, log_op_start, matching_users_query, CompositionContext,
    ConditionSet, DomainEvent, Rule,
};
use dyncohort_store::errors::{from_rusqlite, Result};
use dyncohort_store::matching::matching_user_ids;
use dyncohort_store::{CohortRepo, RuleRepo, SqliteCatalog};
use serde::Serialize;

use crate::engine::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    /// Membership was reconciled with the matched users
    Applied,
    /// The rule has broken conditions; nothing was changed
    Broken,
    /// The matching query failed; the rule is now broken
    QueryFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationOutcome {
    pub rule_id: i64,
    pub status: EvaluationStatus,
    pub matched_count: usize,
    pub added: usize,
    pub removed: usize,
}

impl EvaluationOutcome {
    fn skipped(rule_id: i64, status: EvaluationStatus) -> Self {
        Self {
            rule_id,
            status,
            matched_count: 0,
            added: 0,
            removed: 0,
        }
    }
}

/// Membership changes needed to make a cohort equal a matched set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub to_add: BTreeSet<i64>,
    pub to_remove: BTreeSet<i64>,
}

impl Reconciliation {
    pub fn plan(matched: &BTreeSet<i64>, members: &BTreeSet<i64>) -> Self {
        Self {
            to_add: matched.difference(members).copied().collect(),
            to_remove: members.difference(matched).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Result of composing and running a rule's matching query
#[derive(Debug)]
pub(crate) enum Selection {
    Matched(BTreeSet<i64>),
    Broken,
    Failed(ExError),
}

/// Evaluate one rule now, whether or not it is enabled
///
/// # Errors
///
/// Returns `NotFound` for an unknown rule and `Persistence` if membership
/// cannot be read or written. Query failures are not errors: they flag the
/// rule broken and report `QueryFailed`.
pub fn evaluate_rule(engine: &mut Engine, rule_id: i64) -> Result<EvaluationOutcome> {
    log_op_start!("evaluate_rule", rule_id = rule_id);
    let start = Instant::now();

    let outcome = RuleRepo::require_rule(engine.conn(), rule_id)
        .and_then(|rule| process_rule(engine, &rule, None))
        .map_err(|e| {
            log_op_error!(
                "evaluate_rule",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                rule_id = rule_id
            );
            e
        })?;

    log_op_end!(
        "evaluate_rule",
        duration_ms = start.elapsed().as_millis() as u64,
        rule_id = rule_id,
        matched = outcome.matched_count,
        added = outcome.added,
        removed = outcome.removed
    );
    Ok(outcome)
}

/// Select the rule's users and reconcile its cohort
///
/// `restrict_to` limits both the query and the reconciliation to one user.
pub(crate) fn process_rule(
    engine: &mut Engine,
    rule: &Rule,
    restrict_to: Option<i64>,
) -> Result<EvaluationOutcome> {
    let now = engine.now();
    let matched = match select_users(engine, rule, restrict_to, now)? {
        Selection::Matched(users) => users,
        Selection::Broken => {
            tracing::warn!(rule_id = rule.id, "rule is broken, membership left unchanged");
            if !rule.broken {
                RuleRepo::mark_broken(engine.conn(), rule.id, now)?;
            }
            engine.cache_mut().invalidate(rule.id);
            return Ok(EvaluationOutcome::skipped(rule.id, EvaluationStatus::Broken));
        }
        Selection::Failed(err) => {
            tracing::warn!(rule_id = rule.id, error = %err, "matching query failed");
            RuleRepo::mark_broken(engine.conn(), rule.id, now)?;
            engine.emit(DomainEvent::MatchingFailed {
                rule_id: rule.id,
                message: err.message().to_string(),
            });
            engine.cache_mut().invalidate(rule.id);
            return Ok(EvaluationOutcome::skipped(rule.id, EvaluationStatus::QueryFailed));
        }
    };

    let mut members = CohortRepo::members(engine.conn(), rule.cohort_id)?;
    if let Some(user_id) = restrict_to {
        members.retain(|id| *id == user_id);
    }
    let plan = Reconciliation::plan(&matched, &members);
    tracing::debug!(
        rule_id = rule.id,
        cohort_id = rule.cohort_id,
        matched = matched.len(),
        to_add = plan.to_add.len(),
        to_remove = plan.to_remove.len(),
        bulk = rule.bulk_processing,
        "reconciling cohort"
    );

    let (added, removed) = if plan.is_empty() {
        (0, 0)
    } else if rule.bulk_processing {
        apply_bulk(engine, rule.cohort_id, &plan, now)?
    } else {
        apply_per_user(engine, rule.cohort_id, &plan, now)?
    };

    match restrict_to {
        None => engine.cache_mut().store(rule.id, matched.len(), now),
        Some(_) => engine.cache_mut().invalidate(rule.id),
    }

    Ok(EvaluationOutcome {
        rule_id: rule.id,
        status: EvaluationStatus::Applied,
        matched_count: matched.len(),
        added,
        removed,
    })
}

/// Compose and run the matching query without touching membership
pub(crate) fn select_users(
    engine: &Engine,
    rule: &Rule,
    restrict_to: Option<i64>,
    now: i64,
) -> Result<Selection> {
    if rule.broken {
        return Ok(Selection::Broken);
    }
    let catalog = SqliteCatalog::new(engine.conn());
    let conditions = ConditionSet::from_rule(rule, engine.registry());
    if conditions.is_broken(&catalog) {
        return Ok(Selection::Broken);
    }

    let mut ctx = CompositionContext::new(now);
    // A rule whose conditions cannot compose into a well-formed query is
    // handled like one whose query fails to run.
    let fragment = match conditions.compose(&mut ctx, &catalog) {
        Ok(fragment) => fragment,
        Err(e) => {
            return Ok(Selection::Failed(
                ExError::new(ExErrorKind::QueryExecution)
                    .with_op("compose_rule")
                    .with_rule_id(rule.id)
                    .with_message(e.to_string()),
            ));
        }
    };
    let query = matching_users_query(&fragment, &mut ctx, restrict_to);

    match matching_user_ids(engine.conn(), rule.id, &query) {
        Ok(users) => Ok(Selection::Matched(users)),
        Err(err) if err.kind() == ExErrorKind::QueryExecution => Ok(Selection::Failed(err)),
        Err(err) => Err(err),
    }
}

/// Set operations in one transaction, without per-member events
fn apply_bulk(
    engine: &mut Engine,
    cohort_id: i64,
    plan: &Reconciliation,
    now: i64,
) -> Result<(usize, usize)> {
    let tx = engine.conn_mut().transaction().map_err(from_rusqlite)?;
    let added = CohortRepo::add_members(&tx, cohort_id, &plan.to_add, now)?;
    let removed = CohortRepo::remove_members(&tx, cohort_id, &plan.to_remove)?;
    tx.commit().map_err(from_rusqlite)?;
    Ok((added, removed))
}

/// One committed write and one event per member
fn apply_per_user(
    engine: &mut Engine,
    cohort_id: i64,
    plan: &Reconciliation,
    now: i64,
) -> Result<(usize, usize)> {
    let mut added = 0;
    for user_id in &plan.to_add {
        if CohortRepo::add_member(engine.conn(), cohort_id, *user_id, now)? {
            added += 1;
            engine.emit(DomainEvent::CohortMemberAdded {
                cohort_id,
                user_id: *user_id,
            });
        }
    }
    let mut removed = 0;
    for user_id in &plan.to_remove {
        if CohortRepo::remove_member(engine.conn(), cohort_id, *user_id)? {
            removed += 1;
            engine.emit(DomainEvent::CohortMemberRemoved {
                cohort_id,
                user_id: *user_id,
            });
        }
    }
    Ok((added, removed))
}
