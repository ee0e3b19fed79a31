//! Event-driven re-evaluation for a single user
//!
//! A trigger event re-runs every enabled, unbroken, real-time rule with a
//! condition listening to that event, restricted to the acting user. Nothing
//! here returns an error: failures are logged so that the code raising the
//! event is never interrupted.

use std::time::Instant;

use dyncohort_core::{log_op_end, log_op_start, ConditionSet};
use dyncohort_store::RuleRepo;
use serde::Serialize;

use crate::commands::evaluate::{process_rule, EvaluationOutcome};
use crate::engine::Engine;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriggerOutcome {
    pub event: String,
    pub user_id: i64,
    pub evaluated: Vec<EvaluationOutcome>,
    pub failed: Vec<i64>,
}

/// Re-evaluate the rules listening to `event_name` for `user_id`
pub fn handle_event(engine: &mut Engine, event_name: &str, user_id: i64) -> TriggerOutcome {
    let mut outcome = TriggerOutcome {
        event: event_name.to_string(),
        user_id,
        ..Default::default()
    };
    if !engine.settings().realtime {
        tracing::debug!(trigger = event_name, "real-time processing disabled");
        return outcome;
    }

    log_op_start!("handle_event", trigger = event_name, user_id = user_id);
    let start = Instant::now();

    let rules = match RuleRepo::list_rules(engine.conn()) {
        Ok(rules) => rules,
        Err(err) => {
            tracing::warn!(trigger = event_name, error = %err, "cannot load rules for event");
            Vec::new()
        }
    };
    for rule in rules {
        if !rule.is_active() || !rule.realtime {
            continue;
        }
        if !ConditionSet::from_rule(&rule, engine.registry()).listens_to(event_name) {
            continue;
        }
        match process_rule(engine, &rule, Some(user_id)) {
            Ok(result) => outcome.evaluated.push(result),
            Err(err) => {
                tracing::warn!(
                    rule_id = rule.id,
                    user_id,
                    error = %err,
                    "real-time evaluation failed"
                );
                outcome.failed.push(rule.id);
            }
        }
    }

    log_op_end!(
        "handle_event",
        duration_ms = start.elapsed().as_millis() as u64,
        trigger = event_name,
        evaluated = outcome.evaluated.len(),
        failed = outcome.failed.len()
    );
    outcome
}
