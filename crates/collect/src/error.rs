//! Collector error types

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Failure to collect data for one repository
///
/// `Clone` so a single result can be shared by every coalesced caller.
#[derive(Debug, Clone, Error)]
pub enum CollectError {
    /// The external tool is not installed or not on `PATH`
    #[error("`{program}` is not installed or not on PATH")]
    ToolMissing { program: String },

    /// The process could not be started
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: Arc<io::Error>,
    },

    /// The process ran but reported failure
    #[error("`{command}` exited with {}: {stderr}", exit_code(*.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The process succeeded but its output made no sense
    #[error("unexpected output from `{command}`: {reason}")]
    Parse { command: String, reason: String },
}

fn exit_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

impl CollectError {
    /// Short label for dashboard lines
    pub fn summary(&self) -> &'static str {
        match self {
            CollectError::ToolMissing { .. } => "tool missing",
            CollectError::Spawn { .. } => "spawn failed",
            CollectError::CommandFailed { .. } => "command failed",
            CollectError::Parse { .. } => "bad output",
        }
    }
}

/// Result type for collectors
pub type Result<T> = std::result::Result<T, CollectError>;
