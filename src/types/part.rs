//! Typed message fragments.

use serde::{Deserialize, Serialize};

/// A typed fragment of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text(TextPart),
    Thinking(ThinkingPart),
    Image(ImagePart),
    ToolCall(ToolCallPart),
}

impl Part {
    /// Create a plain text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(TextPart { text: text.into() })
    }

    /// The visible text of this part, if it is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(p) => Some(&p.text),
            _ => None,
        }
    }
}

/// Visible text content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TextPart {
    pub text: String,
}

/// Model reasoning content.
///
/// `signature` is the provider's opaque attestation over the block (a
/// cryptographic signature or an encrypted payload); `format` names the
/// provider dialect that produced it. Both are carried bit-for-bit across
/// history round-trips: providers that attest their reasoning refuse
/// resubmitted thinking without them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ThinkingPart {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// The visible reasoning text or summary.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thinking: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    /// The model that produced this block, for cross-model degradation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model_name: String,
}

/// Image content as base64 bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ImagePart {
    pub mime_type: String,
    pub data_b64: String,
}

/// A tool invocation requested by the model.
///
/// `args_json` holds the raw argument bytes exactly as streamed; the core
/// never parses and re-encodes them, so providers that require byte-identical
/// resubmission are satisfied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolCallPart {
    pub call_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub args_json: String,
}
