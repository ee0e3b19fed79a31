//! Command orchestration layer.
//!
//! Provides high-level command functions that coordinate the condition
//! kernel in `dyncohort-core` with persistence in `dyncohort-store`.

pub mod engine_command;
pub mod evaluate;
pub mod process;
pub mod realtime;
pub mod rules;
