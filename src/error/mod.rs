//! Error types for Stride.

use thiserror::Error;

/// Primary error type for all step operations.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("provider is required")]
    NoProvider,

    #[error("provider stream finished without an assistant message")]
    NoAssistantMessage,

    #[error("stream error: {0}")]
    Stream(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("step cancelled")]
    Cancelled,

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },
}

impl StepError {
    /// Create an API error from a status code and response body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error reflects cooperative cancellation rather than a
    /// genuine failure. Interrupted tool executions are reported this way.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, StepError>;
