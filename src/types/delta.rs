//! Streaming-only updates.

use serde::{Deserialize, Serialize};

/// A streaming-only update. Never appended to conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delta {
    Thinking(ThinkingDelta),
    Text(TextDelta),
    ToolCall(ToolCallDelta),
    ToolExec(ToolExecDelta),
    StepStatus(StepStatusDelta),
}

/// Incremental reasoning content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ThinkingDelta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub delta: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
}

/// Incremental visible assistant text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TextDelta {
    pub delta: String,
}

/// Incremental tool-call argument bytes for the call identified by
/// `call_id` and `name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolCallDelta {
    pub call_id: String,
    pub name: String,
    pub args_delta: String,
}

/// Tool execution lifecycle marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolExecDelta {
    pub call_id: String,
    pub name: String,
    pub stage: ToolExecStage,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolExecStage {
    Start,
    End,
}

/// Step-level status, emitted once at the end of every step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StepStatusDelta {
    pub cancelled: bool,
}
