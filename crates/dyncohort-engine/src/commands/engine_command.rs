//! Engine-level commands as one dispatchable enum.

use dyncohort_core::RuleDraft;
use dyncohort_store::errors::Result;

use crate::commands::evaluate::{evaluate_rule, EvaluationOutcome};
use crate::commands::process::{process_rules, BatchOutcome};
use crate::commands::realtime::{handle_event, TriggerOutcome};
use crate::commands::rules::{
    delete_rules, save_rule, toggle_rule_enabled, view_rule, RuleView, ToggleOutcome,
};
use crate::engine::Engine;

/// Commands that read or write rules and cohort membership.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    SaveRule(RuleDraft),
    EvaluateRule { rule_id: i64 },
    ToggleRule { rule_id: i64 },
    DeleteRules { rule_ids: Vec<i64> },
    ViewRule { rule_id: i64 },
    /// Evaluate every enabled rule.
    ProcessRules,
    /// Real-time trigger raised by the platform for one user.
    Trigger { event: String, user_id: i64 },
}

/// Result of applying an engine command.
#[derive(Debug, Clone)]
pub enum EngineCommandResult {
    RuleSaved { rule_id: i64 },
    RuleEvaluated(EvaluationOutcome),
    RuleToggled(ToggleOutcome),
    RulesDeleted { count: usize },
    RuleViewed(Box<RuleView>),
    RulesProcessed(BatchOutcome),
    Triggered(TriggerOutcome),
}

/// Apply an engine command.
///
/// # Errors
///
/// Returns the error of the underlying command; `Trigger` never fails
pub fn apply_engine_command(
    cmd: EngineCommand,
    engine: &mut Engine,
) -> Result<EngineCommandResult> {
    match cmd {
        EngineCommand::SaveRule(draft) => {
            let rule_id = save_rule(engine, &draft)?;
            Ok(EngineCommandResult::RuleSaved { rule_id })
        }
        EngineCommand::EvaluateRule { rule_id } => {
            evaluate_rule(engine, rule_id).map(EngineCommandResult::RuleEvaluated)
        }
        EngineCommand::ToggleRule { rule_id } => {
            toggle_rule_enabled(engine, rule_id).map(EngineCommandResult::RuleToggled)
        }
        EngineCommand::DeleteRules { rule_ids } => {
            let count = delete_rules(engine, &rule_ids)?;
            Ok(EngineCommandResult::RulesDeleted { count })
        }
        EngineCommand::ViewRule { rule_id } => {
            let view = view_rule(engine, rule_id)?;
            Ok(EngineCommandResult::RuleViewed(Box::new(view)))
        }
        EngineCommand::ProcessRules => {
            process_rules(engine).map(EngineCommandResult::RulesProcessed)
        }
        EngineCommand::Trigger { event, user_id } => Ok(EngineCommandResult::Triggered(
            handle_event(engine, &event, user_id),
        )),
    }
}
