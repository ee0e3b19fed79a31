//! Batch processing of every enabled rule
//!
//! Rules are independent: one rule failing is logged and recorded in the
//! outcome, and the run carries on with the next.

use std::time::Instant;

use dyncohort_core::{log_op_end, log_op_error, log_op_start};
use dyncohort_store::errors::Result;
use dyncohort_store::RuleRepo;
use serde::Serialize;

use crate::commands::evaluate::{process_rule, EvaluationOutcome};
use crate::engine::Engine;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub evaluated: Vec<EvaluationOutcome>,
    /// Disabled or broken rules
    pub skipped: Vec<i64>,
    /// Rules whose pass hit a storage error
    pub failed: Vec<i64>,
}

/// Evaluate every enabled, unbroken rule once
///
/// # Errors
///
/// Returns `Persistence` only if the rule list itself cannot be read
pub fn process_rules(engine: &mut Engine) -> Result<BatchOutcome> {
    log_op_start!("process_rules");
    let start = Instant::now();

    let rules = RuleRepo::list_rules(engine.conn()).map_err(|e| {
        log_op_error!(
            "process_rules",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    let mut outcome = BatchOutcome::default();
    for rule in rules {
        if !rule.is_active() {
            outcome.skipped.push(rule.id);
            continue;
        }
        match process_rule(engine, &rule, None) {
            Ok(result) => outcome.evaluated.push(result),
            Err(err) => {
                tracing::error!(rule_id = rule.id, error = %err, "rule processing failed");
                outcome.failed.push(rule.id);
            }
        }
    }

    log_op_end!(
        "process_rules",
        duration_ms = start.elapsed().as_millis() as u64,
        evaluated = outcome.evaluated.len(),
        skipped = outcome.skipped.len(),
        failed = outcome.failed.len()
    );
    Ok(outcome)
}
