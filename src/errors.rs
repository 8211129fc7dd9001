use std::fmt;
use thiserror::Error;

/// The model calls a turn can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// The first call, offering tools.
    Initial,
    /// The call after a tool round, without tools.
    FollowUp,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnPhase::Initial => f.write_str("initial model call"),
            TurnPhase::FollowUp => f.write_str("follow-up model call"),
        }
    }
}

/// Faults that end a turn. Tool failures never show up here; they go back to
/// the model as `{"error": ...}` payloads.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{phase} failed: {source:#}")]
    Provider {
        phase: TurnPhase,
        #[source]
        source: anyhow::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Faults inside a tool call, reported to the model as data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("unknown tool {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("{0}")]
    ExecutionError(String),
}

impl ToolError {
    /// Prefix the message, as in `Error reading file: ...`.
    pub fn context(self, prefix: &str) -> ToolError {
        ToolError::ExecutionError(format!("{}: {}", prefix, self))
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
