//! DynCohort Engine - Orchestration layer
//!
//! Evaluates rules against the platform data, reconciles cohort membership,
//! and runs the rule lifecycle commands, batch processing and real-time
//! triggers on top of the core and store crates.

pub mod cache;
pub mod clock;
pub mod commands;
pub mod engine;
pub mod settings;

pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::engine_command::{apply_engine_command, EngineCommand, EngineCommandResult};
pub use commands::evaluate::{evaluate_rule, EvaluationOutcome, EvaluationStatus};
pub use commands::process::{process_rules, BatchOutcome};
pub use commands::realtime::{handle_event, TriggerOutcome};
pub use commands::rules::{
    delete_rules, list_rules, save_rule, toggle_rule_enabled, view_rule, RuleView, ToggleOutcome,
};
pub use engine::Engine;
pub use settings::Settings;
