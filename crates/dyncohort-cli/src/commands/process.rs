//! Batch processing and real-time triggers
//!
//! Usage:
//!   dyncohort process
//!   dyncohort trigger <EVENT> <USER_ID>

use clap::Args;
use dyncohort_engine::{apply_engine_command, EngineCommand, EngineCommandResult};

use super::{CliResult, Target};

#[derive(Debug, Args)]
pub struct TriggerArgs {
    /// Platform event name, e.g. user_loggedin
    pub event: String,
    pub user_id: i64,
}

pub fn execute_process(target: &Target) -> CliResult {
    let mut engine = target.engine()?;
    let result = apply_engine_command(EngineCommand::ProcessRules, &mut engine)?;
    if let EngineCommandResult::RulesProcessed(batch) = result {
        for outcome in &batch.evaluated {
            println!(
                "Rule {}: matched {}, added {}, removed {}",
                outcome.rule_id, outcome.matched_count, outcome.added, outcome.removed
            );
        }
        println!(
            "Processed {} rule(s), skipped {}, failed {}",
            batch.evaluated.len(),
            batch.skipped.len(),
            batch.failed.len()
        );
    }
    Ok(())
}

pub fn execute_trigger(target: &Target, args: TriggerArgs) -> CliResult {
    let mut engine = target.engine()?;
    let cmd = EngineCommand::Trigger {
        event: args.event,
        user_id: args.user_id,
    };
    if let EngineCommandResult::Triggered(outcome) = apply_engine_command(cmd, &mut engine)? {
        println!(
            "Event {} for user {}: evaluated {} rule(s), failed {}",
            outcome.event,
            outcome.user_id,
            outcome.evaluated.len(),
            outcome.failed.len()
        );
    }
    Ok(())
}
