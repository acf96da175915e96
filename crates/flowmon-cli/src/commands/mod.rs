//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod account;
pub mod history;
pub mod poll;
pub mod prune;

use crate::output::OutputFormat;
use flowmon_core::Database;

/// Shared context for all commands
pub struct Context {
    pub db: Database,
    pub format: OutputFormat,
    pub quiet: bool,
}
