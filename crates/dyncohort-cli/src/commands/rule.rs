//! Rule commands
//!
//! Usage:
//!   dyncohort rule list
//!   dyncohort rule show <ID> [--json]
//!   dyncohort rule save <FILE>
//!   dyncohort rule evaluate <ID>
//!   dyncohort rule toggle <ID>
//!   dyncohort rule delete <ID>...

use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use dyncohort_core::RuleDraft;
use dyncohort_engine::{
    apply_engine_command, list_rules, EngineCommand, EngineCommandResult, EvaluationStatus,
};

use super::{print_json, CliResult, Target};

#[derive(Debug, Args)]
pub struct RuleArgs {
    #[command(subcommand)]
    pub command: RuleCommand,
}

#[derive(Debug, Subcommand)]
pub enum RuleCommand {
    /// List all rules
    List,
    /// Show a rule with its conditions and matching user count
    Show {
        rule_id: i64,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create or update a rule from a JSON definition
    Save {
        /// Rule definition; include "id" to update an existing rule
        file: PathBuf,
    },
    /// Evaluate one rule and reconcile its cohort
    Evaluate { rule_id: i64 },
    /// Enable or disable a rule
    Toggle { rule_id: i64 },
    /// Delete rules (all or nothing)
    Delete {
        #[arg(required = true)]
        rule_ids: Vec<i64>,
    },
}

pub fn execute(target: &Target, args: RuleArgs) -> CliResult {
    let mut engine = target.engine()?;

    match args.command {
        RuleCommand::List => {
            let rules = list_rules(&engine)?;
            if rules.is_empty() {
                println!("No rules");
            }
            for rule in rules {
                let state = match (rule.enabled, rule.broken) {
                    (_, true) => "broken",
                    (true, false) => "enabled",
                    (false, false) => "disabled",
                };
                println!(
                    "{}\t{}\tcohort={}\t{}\t{}",
                    rule.id,
                    rule.name,
                    rule.cohort_id,
                    rule.combinator.as_str(),
                    state
                );
            }
        }
        RuleCommand::Show { rule_id, json } => {
            let result = apply_engine_command(EngineCommand::ViewRule { rule_id }, &mut engine)?;
            let EngineCommandResult::RuleViewed(view) = result else {
                return Err("unexpected command result".into());
            };
            if json {
                return print_json(&view);
            }
            println!("Rule {}: {}", view.rule.id, view.rule.name);
            println!("  cohort: {}", view.rule.cohort_id);
            println!("  combinator: {}", view.rule.combinator.as_str());
            println!("  enabled: {}", view.rule.enabled);
            println!("  broken: {}", view.broken);
            match view.matching_users {
                Some(count) => println!("  matching users: {}", count),
                None => println!("  matching users: unavailable"),
            }
            for condition in &view.conditions {
                let marker = if condition.broken { " [broken]" } else { "" };
                println!("  - {}: {}{}", condition.name, condition.description, marker);
            }
            if !view.events.is_empty() {
                println!("  events: {}", view.events.join(", "));
            }
        }
        RuleCommand::Save { file } => {
            let raw = fs::read_to_string(&file)
                .map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
            let draft: RuleDraft = serde_json::from_str(&raw)
                .map_err(|e| format!("invalid rule definition {}: {}", file.display(), e))?;
            let result = apply_engine_command(EngineCommand::SaveRule(draft), &mut engine)?;
            if let EngineCommandResult::RuleSaved { rule_id } = result {
                println!("Rule saved: {}", rule_id);
            }
        }
        RuleCommand::Evaluate { rule_id } => {
            let result =
                apply_engine_command(EngineCommand::EvaluateRule { rule_id }, &mut engine)?;
            if let EngineCommandResult::RuleEvaluated(outcome) = result {
                match outcome.status {
                    EvaluationStatus::Applied => println!(
                        "Rule {}: matched {}, added {}, removed {}",
                        outcome.rule_id, outcome.matched_count, outcome.added, outcome.removed
                    ),
                    EvaluationStatus::Broken => {
                        println!("Rule {}: broken, membership unchanged", outcome.rule_id)
                    }
                    EvaluationStatus::QueryFailed => println!(
                        "Rule {}: matching query failed, rule disabled",
                        outcome.rule_id
                    ),
                }
            }
        }
        RuleCommand::Toggle { rule_id } => {
            let result = apply_engine_command(EngineCommand::ToggleRule { rule_id }, &mut engine)?;
            if let EngineCommandResult::RuleToggled(outcome) = result {
                let state = if outcome.enabled { "enabled" } else { "disabled" };
                println!("Rule {} {}", outcome.rule_id, state);
            }
        }
        RuleCommand::Delete { rule_ids } => {
            let result =
                apply_engine_command(EngineCommand::DeleteRules { rule_ids }, &mut engine)?;
            if let EngineCommandResult::RulesDeleted { count } = result {
                println!("Deleted {} rule(s)", count);
            }
        }
    }

    Ok(())
}
