//! Request lifecycle.
//!
//! This module provides:
//! - The per-request run configuration
//! - The run state machine
//! - URL selection through a completion model
//! - Prompt assembly
//! - The orchestrator that ties the stages together

mod orchestrator;
mod prompt;
mod run_config;
mod selector;
mod state;

pub use orchestrator::{PipelineOrchestrator, RunReport};
pub use prompt::{build_snippet_message, build_user_message};
pub use run_config::{RunConfig, RunHeaders};
pub use selector::{parse_selection, selection_instruction, selection_message, UrlSelector};
pub use state::PipelineState;
