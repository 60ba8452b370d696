//! Custom error types for Teddy
//!
//! Provides a unified error handling system across all modules.
//!
//! Only configuration problems abort a run. Tool failures travel as data
//! inside `ToolResult` parts and turn faults become error events, so most of
//! these variants end up rendered into history rather than propagated.

use thiserror::Error;

/// Main error type for Teddy operations
#[derive(Error, Debug)]
pub enum TeddyError {
    /// An agent invoked a tool outside of its capability set
    #[error("Agent '{agent}' is not permitted to call tool '{tool}'")]
    CapabilityDenied { agent: String, tool: String },

    /// The turn-execution service failed
    #[error("Turn execution error: {0}")]
    TurnExecution(String),

    /// The run cannot start with the given roster or budget
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Ollama connection or API errors
    #[error("Ollama error: {0}")]
    Ollama(String),

    /// Model not available
    #[error("Model '{0}' not available in Ollama. Run: ollama pull {0}")]
    ModelNotFound(String),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Teddy operations
pub type Result<T> = std::result::Result<T, TeddyError>;

impl TeddyError {
    /// Create a capability error
    pub fn denied(agent: impl Into<String>, tool: impl Into<String>) -> Self {
        Self::CapabilityDenied {
            agent: agent.into(),
            tool: tool.into(),
        }
    }

    /// Create a turn execution error
    pub fn turn(msg: impl Into<String>) -> Self {
        Self::TurnExecution(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an Ollama error
    pub fn ollama(msg: impl Into<String>) -> Self {
        Self::Ollama(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
