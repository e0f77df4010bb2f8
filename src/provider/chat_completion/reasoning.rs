//! Reasoning dialect handling.
//!
//! Providers disagree on how reasoning is named, split, and attested on the
//! wire. A [`ReasoningHandler`] reconciles one dialect with the canonical
//! [`ThinkingPart`]: it decodes streamed fragments on the way in and
//! re-serializes stored parts on the way out.

use serde::Serialize;

use crate::types::ThinkingPart;

use super::wire::ChunkDelta;

/// The delta key for single-field textual reasoning.
pub const REASONING_FIELD: &str = "reasoning";

/// Stored reasoning encoded for a provider request.
#[derive(Debug, Clone, Default)]
pub struct EncodedThinking {
    /// Provider-specific extra field `(key, value)` carrying resubmittable
    /// reasoning, or `None` when the dialect takes no reasoning on input.
    pub extra: Option<(String, serde_json::Value)>,
    /// Reasoning degraded to plain text (cross-model parts), to be prepended
    /// to the assistant's visible content.
    pub degraded_text: String,
}

/// Per-dialect reasoning codec.
///
/// A handler instance lives for one stream: `absorb_delta` accumulates the
/// streamed fragments, `flush` drains them as canonical parts at
/// finalization. `encode_for_request` is the inverse direction, used when
/// history containing thinking parts is resubmitted.
pub trait ReasoningHandler: Send {
    /// Convert stored thinking parts to the dialect's request shape. Parts
    /// whose `model_name` disagrees with `target_model` cannot be resubmitted
    /// faithfully and come back as `degraded_text` instead.
    fn encode_for_request(&self, parts: &[ThinkingPart], target_model: &str) -> EncodedThinking;

    /// Inspect one wire delta. Returns `Some(visible_text)` when the delta
    /// carries reasoning; the text may be empty for encrypted-only fragments,
    /// which are accepted silently for later assembly.
    fn absorb_delta(&mut self, delta: &ChunkDelta) -> Option<String>;

    /// Drain accumulated thinking parts in emission order.
    fn flush(&mut self) -> Vec<ThinkingPart>;
}

/// No reasoning support. The plain chat-completion API neither emits nor
/// accepts reasoning.
#[derive(Debug, Default)]
pub struct NoReasoning;

impl ReasoningHandler for NoReasoning {
    fn encode_for_request(&self, _parts: &[ThinkingPart], _target_model: &str) -> EncodedThinking {
        EncodedThinking::default()
    }

    fn absorb_delta(&mut self, _delta: &ChunkDelta) -> Option<String> {
        None
    }

    fn flush(&mut self) -> Vec<ThinkingPart> {
        Vec::new()
    }
}

/// Single-field textual reasoning: a plain string under the `reasoning` key
/// in each delta, concatenated across the stream into one [`ThinkingPart`].
#[derive(Debug)]
pub struct TextReasoning {
    model_name: String,
    accumulated: Vec<String>,
}

impl TextReasoning {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            accumulated: Vec::new(),
        }
    }
}

impl ReasoningHandler for TextReasoning {
    fn encode_for_request(&self, parts: &[ThinkingPart], target_model: &str) -> EncodedThinking {
        let mut reasoning = String::new();
        let mut degraded_text = String::new();

        for part in parts {
            if part.thinking.is_empty() {
                continue;
            }
            if !part.model_name.is_empty() && part.model_name != target_model {
                degraded_text.push_str(&part.thinking);
                continue;
            }
            reasoning.push_str(&part.thinking);
        }

        let extra = (!reasoning.is_empty())
            .then(|| (REASONING_FIELD.to_string(), serde_json::Value::String(reasoning)));
        EncodedThinking {
            extra,
            degraded_text,
        }
    }

    fn absorb_delta(&mut self, delta: &ChunkDelta) -> Option<String> {
        match delta.reasoning.as_deref() {
            Some(text) if !text.is_empty() => {
                self.accumulated.push(text.to_string());
                Some(text.to_string())
            }
            _ => None,
        }
    }

    fn flush(&mut self) -> Vec<ThinkingPart> {
        if self.accumulated.is_empty() {
            return Vec::new();
        }
        let thinking = std::mem::take(&mut self.accumulated).concat();
        vec![ThinkingPart {
            thinking,
            model_name: self.model_name.clone(),
            ..Default::default()
        }]
    }
}

/// Serialize a value into the `serde_json::Value` carried by
/// [`EncodedThinking::extra`].
pub(crate) fn to_extra_value(value: impl Serialize) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
