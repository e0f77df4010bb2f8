//! Structured reasoning-details dialect.
//!
//! Reasoning arrives as an array of typed entries per delta
//! (`reasoning.text`, `reasoning.summary`, `reasoning.encrypted`). Text and
//! summary fragments accumulate into the current block; an encrypted entry,
//! or an embedded signature on a text entry, seals the block and starts a
//! new one. Sealed blocks carry their `signature` and `format` verbatim so
//! they survive resubmission to providers that verify them.

use crate::types::ThinkingPart;

use super::reasoning::{to_extra_value, EncodedThinking, ReasoningHandler};
use super::wire::{
    ChunkDelta, ReasoningDetail, DETAIL_ENCRYPTED, DETAIL_SUMMARY, DETAIL_TEXT, FORMAT_ANTHROPIC,
    FORMAT_OPENAI_RESPONSES,
};

/// The extra-field key carrying reasoning details on resubmission.
pub const REASONING_DETAILS_FIELD: &str = "reasoning_details";

/// Handler for the structured reasoning-details dialect.
#[derive(Debug)]
pub struct DetailReasoning {
    model_name: String,
    parts: Vec<ThinkingPart>,
    current: Option<ThinkingPart>,
}

impl DetailReasoning {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            parts: Vec::new(),
            current: None,
        }
    }

    fn current_part(&mut self) -> &mut ThinkingPart {
        if self.current.is_none() {
            self.current = Some(ThinkingPart {
                model_name: self.model_name.clone(),
                ..Default::default()
            });
        }
        self.current.as_mut().expect("current part was just set")
    }

    fn seal_current(&mut self) {
        if let Some(part) = self.current.take() {
            self.parts.push(part);
        }
    }
}

impl ReasoningHandler for DetailReasoning {
    fn encode_for_request(&self, parts: &[ThinkingPart], target_model: &str) -> EncodedThinking {
        let mut details: Vec<ReasoningDetail> = Vec::new();
        let mut degraded_text = String::new();

        for (index, part) in parts.iter().enumerate() {
            let index = index as u32;

            if !part.model_name.is_empty() && part.model_name != target_model {
                if !part.thinking.is_empty() {
                    degraded_text.push_str("<thinking>\n");
                    degraded_text.push_str(&part.thinking);
                    degraded_text.push_str("\n</thinking>\n");
                }
                continue;
            }

            match part.format.as_str() {
                // One text detail with the signature embedded.
                FORMAT_ANTHROPIC => {
                    if !part.thinking.is_empty() || !part.signature.is_empty() {
                        details.push(ReasoningDetail {
                            kind: DETAIL_TEXT.to_string(),
                            id: part.id.clone(),
                            format: part.format.clone(),
                            text: part.thinking.clone(),
                            signature: part.signature.clone(),
                            index,
                            ..Default::default()
                        });
                    }
                }
                // Visible summary plus a separate encrypted payload.
                FORMAT_OPENAI_RESPONSES => {
                    if !part.thinking.is_empty() {
                        details.push(ReasoningDetail {
                            kind: DETAIL_SUMMARY.to_string(),
                            id: part.id.clone(),
                            format: part.format.clone(),
                            summary: part.thinking.clone(),
                            index,
                            ..Default::default()
                        });
                    }
                    if !part.signature.is_empty() {
                        details.push(ReasoningDetail {
                            kind: DETAIL_ENCRYPTED.to_string(),
                            format: part.format.clone(),
                            data: part.signature.clone(),
                            index,
                            ..Default::default()
                        });
                    }
                }
                // Plain text plus a separate encrypted payload.
                _ => {
                    if !part.thinking.is_empty() {
                        details.push(ReasoningDetail {
                            kind: DETAIL_TEXT.to_string(),
                            id: part.id.clone(),
                            format: part.format.clone(),
                            text: part.thinking.clone(),
                            index,
                            ..Default::default()
                        });
                    }
                    if !part.signature.is_empty() {
                        details.push(ReasoningDetail {
                            kind: DETAIL_ENCRYPTED.to_string(),
                            id: part.id.clone(),
                            format: part.format.clone(),
                            data: part.signature.clone(),
                            index,
                            ..Default::default()
                        });
                    }
                }
            }
        }

        let extra = (!details.is_empty())
            .then(|| (REASONING_DETAILS_FIELD.to_string(), to_extra_value(details)));
        EncodedThinking {
            extra,
            degraded_text,
        }
    }

    fn absorb_delta(&mut self, delta: &ChunkDelta) -> Option<String> {
        if delta.reasoning_details.is_empty() {
            return None;
        }

        let mut all_text = String::new();
        for detail in &delta.reasoning_details {
            match detail.kind.as_str() {
                DETAIL_TEXT => {
                    let part = self.current_part();
                    if !detail.id.is_empty() {
                        part.id = detail.id.clone();
                    }
                    if !detail.format.is_empty() {
                        part.format = detail.format.clone();
                    }
                    if !detail.text.is_empty() {
                        part.thinking.push_str(&detail.text);
                        all_text.push_str(&detail.text);
                    }
                    if !detail.signature.is_empty() {
                        part.signature = detail.signature.clone();
                        self.seal_current();
                    }
                }
                DETAIL_SUMMARY => {
                    let part = self.current_part();
                    if !detail.id.is_empty() {
                        part.id = detail.id.clone();
                    }
                    if !detail.format.is_empty() {
                        part.format = detail.format.clone();
                    }
                    if !detail.summary.is_empty() {
                        part.thinking.push_str(&detail.summary);
                        all_text.push_str(&detail.summary);
                    }
                }
                DETAIL_ENCRYPTED => {
                    let part = self.current_part();
                    if !detail.id.is_empty() {
                        part.id = detail.id.clone();
                    }
                    if !detail.data.is_empty() {
                        part.signature = detail.data.clone();
                    }
                    if !detail.format.is_empty() {
                        part.format = detail.format.clone();
                    }
                    self.seal_current();
                }
                _ => {}
            }
        }

        Some(all_text)
    }

    fn flush(&mut self) -> Vec<ThinkingPart> {
        // A still-open block without a signature belongs to a model that
        // does not attest its reasoning; keep it if it has visible text.
        if self
            .current
            .as_ref()
            .is_some_and(|part| !part.thinking.is_empty())
        {
            self.seal_current();
        }
        self.current = None;
        std::mem::take(&mut self.parts)
    }
}
