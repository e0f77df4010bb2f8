//! Wire types for the chat-completion streaming format.
//!
//! One SSE `data:` payload parses into one [`ChatChunk`]. Fragments of
//! different kinds (reasoning, visible text, tool calls) may share a chunk;
//! unknown fields are ignored.

use serde::{Deserialize, Serialize};

use crate::types::Usage;

/// One parsed streaming chunk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// The incremental payload of a chunk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ChunkToolCall>,
    /// Single-field textual reasoning dialect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Structured reasoning-details dialect.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning_details: Vec<ReasoningDetail>,
}

/// A tool-call fragment, keyed by wire index.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChunkToolCall {
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub function: ChunkFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChunkFunction {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arguments: String,
}

/// One entry of the structured `reasoning_details` dialect.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReasoningDetail {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    /// Embedded signature on a text entry (Claude dialect).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(default)]
    pub index: u32,
}

/// Detail entry kinds.
pub const DETAIL_TEXT: &str = "reasoning.text";
pub const DETAIL_SUMMARY: &str = "reasoning.summary";
pub const DETAIL_ENCRYPTED: &str = "reasoning.encrypted";

/// Reasoning dialect format tags.
pub const FORMAT_ANTHROPIC: &str = "anthropic-claude-v1";
pub const FORMAT_OPENAI_RESPONSES: &str = "openai-responses-v1";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
}

impl WireUsage {
    pub fn to_usage(&self) -> Usage {
        Usage {
            input_tokens: self.prompt_tokens,
            output_tokens: self.completion_tokens,
            cached_read_tokens: self
                .prompt_tokens_details
                .as_ref()
                .map(|d| d.cached_tokens)
                .unwrap_or_default(),
            total_tokens: self.total_tokens,
        }
    }
}
