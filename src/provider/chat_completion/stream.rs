//! Streaming adapter: chat-completion chunks to normalized provider updates.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::provider::debug::{DebugRecord, DebugSink};
use crate::provider::{ProviderStream, ProviderUpdate};
use crate::types::{
    AssistantMessage, Delta, Part, StopReason, TextDelta, TextPart, ThinkingDelta, ToolCallDelta,
    ToolCallPart, Usage,
};

use super::reasoning::ReasoningHandler;
use super::wire::ChatChunk;

/// A stream of parsed wire chunks, however they were transported.
pub type ChunkStream = BoxStream<'static, Result<ChatChunk, StepError>>;

#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    args: String,
}

/// Drains a chunk stream and assembles exactly one assistant message.
///
/// Exclusive `&mut self` access on [`next`](ProviderStream::next) serializes
/// concurrent callers; the expected pattern is a single reader.
pub struct ChatCompletionStream {
    provider_name: &'static str,
    model_name: String,
    chunks: Option<ChunkStream>,
    handler: Box<dyn ReasoningHandler>,
    debug: Option<Arc<DebugSink>>,
    cancel: CancellationToken,

    pending: VecDeque<ProviderUpdate>,
    done: bool,

    text_fragments: Vec<String>,
    tool_calls: HashMap<u32, ToolCallAccumulator>,
    usage: Option<Usage>,
    stop_reason: Option<StopReason>,
}

impl ChatCompletionStream {
    pub fn new(
        provider_name: &'static str,
        model_name: impl Into<String>,
        chunks: ChunkStream,
        handler: Box<dyn ReasoningHandler>,
        debug: Option<Arc<DebugSink>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider_name,
            model_name: model_name.into(),
            chunks: Some(chunks),
            handler,
            debug,
            cancel,
            pending: VecDeque::new(),
            done: false,
            text_fragments: Vec::new(),
            tool_calls: HashMap::new(),
            usage: None,
            stop_reason: None,
        }
    }

    fn log(&self, kind: &str, data: impl serde::Serialize) {
        if let Some(debug) = &self.debug {
            debug.log(
                &DebugRecord::new(kind, data).with_source(self.provider_name, &self.model_name),
            );
        }
    }

    fn enqueue(&mut self, delta: Delta) {
        self.pending.push_back(ProviderUpdate::Delta(delta));
    }

    fn process_chunk(&mut self, chunk: ChatChunk) {
        self.log("chunk", &chunk);

        // Providers send the authoritative usage in a terminal chunk;
        // last writer wins.
        if let Some(usage) = &chunk.usage {
            self.usage = Some(usage.to_usage());
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return;
        };

        if let Some(reason) = choice.finish_reason.as_deref() {
            self.stop_reason = Some(map_finish_reason(reason));
        }

        let delta = choice.delta;

        // Reasoning never short-circuits the rest of the chunk: text and
        // tool-call fragments may ride alongside it.
        if let Some(text) = self.handler.absorb_delta(&delta) {
            if !text.is_empty() {
                self.enqueue(Delta::Thinking(ThinkingDelta {
                    delta: text,
                    ..Default::default()
                }));
            }
        }

        if let Some(content) = delta.content.as_deref() {
            if !content.is_empty() {
                self.text_fragments.push(content.to_string());
                self.enqueue(Delta::Text(TextDelta {
                    delta: content.to_string(),
                }));
            }
        }

        for fragment in delta.tool_calls {
            let acc = self.tool_calls.entry(fragment.index).or_default();
            if !fragment.id.is_empty() {
                acc.id = fragment.id;
            }
            if !fragment.function.name.is_empty() {
                acc.name = fragment.function.name;
            }
            if !fragment.function.arguments.is_empty() {
                acc.args.push_str(&fragment.function.arguments);
                let update = Delta::ToolCall(ToolCallDelta {
                    call_id: acc.id.clone(),
                    name: acc.name.clone(),
                    args_delta: fragment.function.arguments,
                });
                self.enqueue(update);
            }
        }
    }

    /// Assemble the assistant message from whatever has accumulated and
    /// enqueue it as the terminal update. Thinking parts come first, then
    /// one concatenated text part, then tool calls in wire-index order.
    fn finalize(&mut self) {
        self.chunks = None;

        let mut parts: Vec<Part> = self
            .handler
            .flush()
            .into_iter()
            .map(Part::Thinking)
            .collect();

        if !self.text_fragments.is_empty() {
            parts.push(Part::Text(TextPart {
                text: std::mem::take(&mut self.text_fragments).concat(),
            }));
        }

        let mut indices: Vec<u32> = self.tool_calls.keys().copied().collect();
        indices.sort_unstable();
        for index in indices {
            let acc = self.tool_calls.remove(&index).expect("accumulator exists");
            if acc.id.is_empty() || acc.name.is_empty() {
                continue;
            }
            parts.push(Part::ToolCall(ToolCallPart {
                call_id: acc.id,
                name: acc.name,
                args_json: acc.args,
            }));
        }

        let message = AssistantMessage {
            parts,
            timestamp: Utc::now(),
            usage: self.usage.take(),
            stop_reason: self.stop_reason.unwrap_or_default(),
        };
        self.pending.push_back(ProviderUpdate::Message(message));
        self.done = true;
    }
}

enum Pulled {
    Chunk(ChatChunk),
    Failed(StepError),
    Ended,
    Cancelled,
}

#[async_trait]
impl ProviderStream for ChatCompletionStream {
    async fn next(&mut self) -> Result<Option<ProviderUpdate>, StepError> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                match &update {
                    ProviderUpdate::Delta(delta) => self.log("delta", delta),
                    ProviderUpdate::Message(message) => self.log("message", message),
                }
                return Ok(Some(update));
            }
            if self.done {
                return Ok(None);
            }
            let Some(mut chunks) = self.chunks.take() else {
                return Ok(None);
            };

            let cancel = self.cancel.clone();
            let pulled = tokio::select! {
                _ = cancel.cancelled() => Pulled::Cancelled,
                item = chunks.next() => match item {
                    Some(Ok(chunk)) => Pulled::Chunk(chunk),
                    Some(Err(err)) => Pulled::Failed(err),
                    None => Pulled::Ended,
                },
            };

            match pulled {
                Pulled::Chunk(chunk) => {
                    self.chunks = Some(chunks);
                    self.process_chunk(chunk);
                }
                // Finalize with whatever accumulated so the caller still
                // receives a structured assistant message; dropping the
                // chunk stream releases the transport.
                Pulled::Cancelled | Pulled::Ended => {
                    drop(chunks);
                    self.finalize();
                }
                Pulled::Failed(err) => {
                    drop(chunks);
                    self.done = true;
                    return Err(err);
                }
            }
        }
    }

    async fn close(&mut self) {
        self.chunks = None;
        self.pending.clear();
        self.done = true;
        self.debug = None;
    }
}

fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "stop" => StopReason::Stop,
        "length" => StopReason::Length,
        "tool_calls" => StopReason::ToolUse,
        _ => StopReason::Stop,
    }
}
