//! Rule lifecycle commands: save, toggle, delete and view
//!
//! ## Logging Policy
//!
//! Each public command owns its boundary events through `log_op_start!`,
//! `log_op_end!` and `log_op_error!`. Store and core code below it only use
//! `tracing::debug!`/`warn!`.

use std::collections::BTreeSet;
use std::time::Instant;

use dyncohort_core::errors::ExError;
use dyncohort_core::{
    log_op_end, log_op_error, log_op_start, ConditionSet, ConditionSummary, DomainEvent,
    DynCohortError, Rule, RuleDraft, RuleScope,
};
use dyncohort_store::errors::{from_rusqlite, Result};
use dyncohort_store::repo::MANAGED_COMPONENT;
use dyncohort_store::{CohortRepo, RuleRepo, SqliteCatalog};
use rusqlite::Connection;
use serde::Serialize;

use crate::commands::evaluate::{select_users, Selection};
use crate::engine::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub rule_id: i64,
    pub enabled: bool,
}

/// A rule as shown to an administrator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleView {
    pub rule: Rule,
    /// Stored flag or any condition currently broken
    pub broken: bool,
    pub conditions: Vec<ConditionSummary>,
    /// Trigger events of every condition, sorted
    pub events: Vec<String>,
    /// None when the rule is broken or its query fails
    pub matching_users: Option<usize>,
}

/// Create or update a rule together with its full condition list
///
/// Every condition is validated before anything is written. The rule is
/// stored disabled and unbroken, its cohort is marked as managed, and a
/// cohort it no longer points at is released.
///
/// # Errors
///
/// Returns `InvalidInput` for a blank name or an invalid condition
/// configuration, `UnknownConditionKind` for an unregistered kind and
/// `NotFound` for a missing rule, cohort or foreign condition id.
pub fn save_rule(engine: &mut Engine, draft: &RuleDraft) -> Result<i64> {
    log_op_start!("save_rule", rule_id = ?draft.id, cohort_id = draft.cohort_id);
    let start = Instant::now();

    let rule_id = save_rule_impl(engine, draft).map_err(|e| {
        log_op_error!(
            "save_rule",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "save_rule",
        duration_ms = start.elapsed().as_millis() as u64,
        rule_id = rule_id,
        conditions = draft.conditions.len()
    );
    Ok(rule_id)
}

fn save_rule_impl(engine: &mut Engine, draft: &RuleDraft) -> Result<i64> {
    draft
        .validate()
        .map_err(|e| ExError::from(e).with_op("save_rule"))?;
    if CohortRepo::get(engine.conn(), draft.cohort_id)?.is_none() {
        return Err(ExError::from(DynCohortError::CohortNotFound {
            cohort_id: draft.cohort_id,
        })
        .with_op("save_rule"));
    }
    validate_conditions(engine, draft)?;
    let previous = match draft.id {
        Some(id) => Some(RuleRepo::require_rule(engine.conn(), id)?),
        None => None,
    };

    let now = engine.now();
    let release_members = engine.settings().release_members;
    let tx = engine.conn_mut().transaction().map_err(from_rusqlite)?;
    let rule_id = match draft.id {
        Some(id) => {
            RuleRepo::update_rule(&tx, id, draft, now)?;
            id
        }
        None => RuleRepo::insert_rule(&tx, draft, now)?,
    };
    let changes = RuleRepo::replace_conditions(&tx, rule_id, &draft.conditions, now)?;
    CohortRepo::set_component(&tx, draft.cohort_id, MANAGED_COMPONENT, now)?;
    if let Some(old) = previous.as_ref().filter(|r| r.cohort_id != draft.cohort_id) {
        release_cohort(&tx, old.cohort_id, release_members, now)?;
    }
    tx.commit().map_err(from_rusqlite)?;

    engine.emit(if previous.is_some() {
        DomainEvent::RuleUpdated { rule_id }
    } else {
        DomainEvent::RuleCreated { rule_id }
    });
    for condition_id in changes.created {
        engine.emit(DomainEvent::ConditionCreated {
            rule_id,
            condition_id,
        });
    }
    for condition_id in changes.updated {
        engine.emit(DomainEvent::ConditionUpdated {
            rule_id,
            condition_id,
        });
    }
    for condition_id in changes.deleted {
        engine.emit(DomainEvent::ConditionDeleted {
            rule_id,
            condition_id,
        });
    }
    engine.cache_mut().invalidate(rule_id);
    Ok(rule_id)
}

fn validate_conditions(engine: &Engine, draft: &RuleDraft) -> Result<()> {
    let catalog = SqliteCatalog::new(engine.conn());
    let scope = RuleScope {
        rule_id: draft.id.unwrap_or(0),
        cohort_id: draft.cohort_id,
    };
    for record in &draft.conditions {
        let condition = engine
            .registry()
            .create(&record.kind, record.config.clone(), &scope)
            .map_err(|e| ExError::from(e).with_op("save_rule"))?;
        let errors = condition.config_form_validate(&record.config, &catalog);
        if !errors.is_empty() {
            let err = DynCohortError::InvalidConditionConfig {
                kind: record.kind.clone(),
                errors,
            };
            let mut ex = ExError::from(err).with_op("save_rule");
            if let Some(id) = record.id {
                ex = ex.with_condition_id(id);
            }
            return Err(ex);
        }
    }
    Ok(())
}

/// Unmark a cohort that no rule targets any more
///
/// Returns whether the cohort was released. With `release_members` the
/// cohort is also emptied, without per-member events.
fn release_cohort(
    conn: &Connection,
    cohort_id: i64,
    release_members: bool,
    now: i64,
) -> Result<bool> {
    let managed = CohortRepo::get(conn, cohort_id)?
        .is_some_and(|cohort| cohort.component == MANAGED_COMPONENT);
    if !managed || !RuleRepo::list_rules_for_cohort(conn, cohort_id)?.is_empty() {
        return Ok(false);
    }
    CohortRepo::set_component(conn, cohort_id, "", now)?;
    if release_members {
        let removed = CohortRepo::remove_all_members(conn, cohort_id)?;
        tracing::debug!(cohort_id, removed, "released cohort emptied");
    }
    Ok(true)
}

/// Flip a rule's enabled flag
///
/// Enabling a broken rule is refused. The rule is disabled and flagged
/// broken before the error is returned.
///
/// # Errors
///
/// Returns `NotFound` for an unknown rule and `InvalidState` when enabling
/// a broken rule
pub fn toggle_rule_enabled(engine: &mut Engine, rule_id: i64) -> Result<ToggleOutcome> {
    log_op_start!("toggle_rule_enabled", rule_id = rule_id);
    let start = Instant::now();

    let outcome = toggle_rule_enabled_impl(engine, rule_id).map_err(|e| {
        log_op_error!(
            "toggle_rule_enabled",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            rule_id = rule_id
        );
        e
    })?;

    log_op_end!(
        "toggle_rule_enabled",
        duration_ms = start.elapsed().as_millis() as u64,
        rule_id = rule_id,
        enabled = outcome.enabled
    );
    Ok(outcome)
}

fn toggle_rule_enabled_impl(engine: &mut Engine, rule_id: i64) -> Result<ToggleOutcome> {
    let rule = RuleRepo::require_rule(engine.conn(), rule_id)?;
    let now = engine.now();
    engine.cache_mut().invalidate(rule_id);

    if rule.enabled {
        RuleRepo::set_enabled(engine.conn(), rule_id, false, now)?;
        engine.emit(DomainEvent::RuleUpdated { rule_id });
        return Ok(ToggleOutcome {
            rule_id,
            enabled: false,
        });
    }

    if is_rule_broken(engine, &rule) {
        RuleRepo::mark_broken(engine.conn(), rule_id, now)?;
        engine.emit(DomainEvent::RuleUpdated { rule_id });
        return Err(ExError::from(DynCohortError::BrokenRuleEnable { rule_id })
            .with_op("toggle_rule_enabled"));
    }

    RuleRepo::set_enabled(engine.conn(), rule_id, true, now)?;
    engine.emit(DomainEvent::RuleUpdated { rule_id });
    Ok(ToggleOutcome {
        rule_id,
        enabled: true,
    })
}

fn is_rule_broken(engine: &Engine, rule: &Rule) -> bool {
    if rule.broken {
        return true;
    }
    let catalog = SqliteCatalog::new(engine.conn());
    ConditionSet::from_rule(rule, engine.registry()).is_broken(&catalog)
}

/// Delete several rules and their conditions at once
///
/// Every id is checked first; if any is missing nothing is deleted.
/// Cohorts left without a rule are released.
///
/// # Errors
///
/// Returns `NotFound` carrying the missing ids, or `Persistence` if the
/// transaction fails
pub fn delete_rules(engine: &mut Engine, rule_ids: &[i64]) -> Result<usize> {
    log_op_start!("delete_rules", count = rule_ids.len());
    let start = Instant::now();

    let deleted = delete_rules_impl(engine, rule_ids).map_err(|e| {
        log_op_error!(
            "delete_rules",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "delete_rules",
        duration_ms = start.elapsed().as_millis() as u64,
        deleted = deleted
    );
    Ok(deleted)
}

fn delete_rules_impl(engine: &mut Engine, rule_ids: &[i64]) -> Result<usize> {
    let requested: BTreeSet<i64> = rule_ids.iter().copied().collect();
    let existing = RuleRepo::existing_ids(engine.conn(), rule_ids)?;
    let missing: Vec<i64> = requested.difference(&existing).copied().collect();
    if !missing.is_empty() {
        return Err(ExError::from(DynCohortError::RulesNotFound { rule_ids: missing })
            .with_op("delete_rules"));
    }

    let mut rules = Vec::with_capacity(requested.len());
    for rule_id in &requested {
        rules.push(RuleRepo::require_rule(engine.conn(), *rule_id)?);
    }
    let cohorts: BTreeSet<i64> = rules.iter().map(|r| r.cohort_id).collect();

    let now = engine.now();
    let release_members = engine.settings().release_members;
    let tx = engine.conn_mut().transaction().map_err(from_rusqlite)?;
    for rule in &rules {
        RuleRepo::delete_rule(&tx, rule.id)?;
    }
    for cohort_id in cohorts {
        release_cohort(&tx, cohort_id, release_members, now)?;
    }
    tx.commit().map_err(from_rusqlite)?;

    for rule in &rules {
        for condition_id in rule.conditions.iter().filter_map(|c| c.id) {
            engine.emit(DomainEvent::ConditionDeleted {
                rule_id: rule.id,
                condition_id,
            });
        }
        engine.emit(DomainEvent::RuleDeleted { rule_id: rule.id });
        engine.cache_mut().invalidate(rule.id);
    }
    Ok(rules.len())
}

/// Rule details with condition summaries and the matching-user count
///
/// # Errors
///
/// Returns `NotFound` for an unknown rule
pub fn view_rule(engine: &mut Engine, rule_id: i64) -> Result<RuleView> {
    let rule = RuleRepo::require_rule(engine.conn(), rule_id)?;
    let (broken, conditions, events) = {
        let catalog = SqliteCatalog::new(engine.conn());
        let set = ConditionSet::from_rule(&rule, engine.registry());
        (
            rule.broken || set.is_broken(&catalog),
            set.summaries(&catalog),
            set.events().into_iter().map(str::to_string).collect(),
        )
    };
    let matching_users = if broken {
        None
    } else {
        matching_users_count(engine, &rule)?
    };
    Ok(RuleView {
        rule,
        broken,
        conditions,
        events,
        matching_users,
    })
}

/// Count of users the rule would match now, served from the cache when fresh
///
/// Never changes membership or the rule's broken flag.
fn matching_users_count(engine: &mut Engine, rule: &Rule) -> Result<Option<usize>> {
    let now = engine.now();
    if let Some(count) = engine.cache().get(rule.id, now) {
        return Ok(Some(count));
    }
    match select_users(engine, rule, None, now)? {
        Selection::Matched(users) => {
            engine.cache_mut().store(rule.id, users.len(), now);
            Ok(Some(users.len()))
        }
        Selection::Broken => Ok(None),
        Selection::Failed(err) => {
            tracing::warn!(rule_id = rule.id, error = %err, "matching preview failed");
            Ok(None)
        }
    }
}

/// Every rule in id order
///
/// # Errors
///
/// Returns `Persistence` if the rules cannot be read
pub fn list_rules(engine: &Engine) -> Result<Vec<Rule>> {
    RuleRepo::list_rules(engine.conn())
}
