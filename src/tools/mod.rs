//! Tool trait and supporting types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::types::{Part, ToolCallPart};

/// Declarative tool schema exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON-Schema object describing the arguments.
    pub parameters: serde_json::Value,
    /// Whether this tool may run concurrently with other parallel tools.
    /// Read-only tools (search, fetch, sub-agents) are typical candidates.
    #[serde(skip)]
    pub parallel: bool,
}

/// Normalized tool execution result.
///
/// `call_id` and `name` may be left empty; the executor fills them in from
/// the originating call.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub parts: Vec<Part>,
    pub is_error: bool,
    /// Out-of-band hints for UI rendering, opaque to the core.
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl ToolResult {
    /// A successful result carrying a single text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
            ..Default::default()
        }
    }

    /// An error result carrying a single text part.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
            is_error: true,
            ..Default::default()
        }
    }
}

/// An executable tool.
///
/// `execute` receives a child token of the step's cancellation token;
/// long-running tools should poll it and bail out with
/// [`StepError::Cancelled`] when it fires.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn execute(
        &self,
        cancel: CancellationToken,
        call: &ToolCallPart,
    ) -> Result<ToolResult, StepError>;
}
