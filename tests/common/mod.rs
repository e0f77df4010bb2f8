//! Shared test support: scripted providers, chunk-fed providers, and tools.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use futures::stream;
use futures::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use stride::provider::chat_completion::reasoning::{NoReasoning, ReasoningHandler, TextReasoning};
use stride::provider::chat_completion::reasoning_details::DetailReasoning;
use stride::provider::chat_completion::stream::{ChatCompletionStream, ChunkStream};
use stride::provider::chat_completion::wire::{
    ChatChunk, ChunkChoice, ChunkDelta, ChunkFunction, ChunkToolCall, WireUsage,
};
use stride::{
    AssistantMessage, Message, Part, Provider, ProviderRequest, ProviderStream, ProviderUpdate,
    StepError, StopReason, TextPart, Tool, ToolCallPart, ToolResult, ToolSpec,
};

// ---- scripted provider ----------------------------------------------------

/// Serves a pre-baked update sequence, optionally ending in a transport
/// error instead of end-of-stream.
pub struct ScriptedProvider {
    updates: Vec<ProviderUpdate>,
    fail_with: Option<String>,
}

impl ScriptedProvider {
    pub fn new(updates: Vec<ProviderUpdate>) -> Self {
        Self {
            updates,
            fail_with: None,
        }
    }

    pub fn failing(updates: Vec<ProviderUpdate>, message: impl Into<String>) -> Self {
        Self {
            updates,
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn stream(
        &self,
        _cancel: CancellationToken,
        _req: ProviderRequest,
    ) -> Result<Box<dyn ProviderStream>, StepError> {
        Ok(Box::new(ScriptedStream {
            updates: self.updates.clone().into(),
            fail_with: self.fail_with.clone(),
        }))
    }
}

struct ScriptedStream {
    updates: VecDeque<ProviderUpdate>,
    fail_with: Option<String>,
}

#[async_trait]
impl ProviderStream for ScriptedStream {
    async fn next(&mut self) -> Result<Option<ProviderUpdate>, StepError> {
        if let Some(update) = self.updates.pop_front() {
            return Ok(Some(update));
        }
        match self.fail_with.take() {
            Some(message) => Err(StepError::Stream(message)),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.updates.clear();
    }
}

// ---- chunk-fed provider ---------------------------------------------------

#[derive(Clone, Copy)]
pub enum HandlerKind {
    None,
    Text,
    Details,
}

/// Feeds synthetic wire chunks through the real chat-completion adapter.
pub struct ChunkProvider {
    model: String,
    chunks: Vec<ChatChunk>,
    handler: HandlerKind,
    /// When set, the chunk stream never ends on its own; only cancellation
    /// finishes the turn.
    hang_after_chunks: bool,
}

impl ChunkProvider {
    pub fn new(chunks: Vec<ChatChunk>) -> Self {
        Self {
            model: "test-model".to_string(),
            chunks,
            handler: HandlerKind::Text,
            hang_after_chunks: false,
        }
    }

    pub fn with_handler(mut self, handler: HandlerKind) -> Self {
        self.handler = handler;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang_after_chunks = true;
        self
    }
}

#[async_trait]
impl Provider for ChunkProvider {
    async fn stream(
        &self,
        cancel: CancellationToken,
        _req: ProviderRequest,
    ) -> Result<Box<dyn ProviderStream>, StepError> {
        let handler: Box<dyn ReasoningHandler> = match self.handler {
            HandlerKind::None => Box::new(NoReasoning),
            HandlerKind::Text => Box::new(TextReasoning::new(&self.model)),
            HandlerKind::Details => Box::new(DetailReasoning::new(&self.model)),
        };
        let head = stream::iter(self.chunks.clone().into_iter().map(Ok));
        let chunks: ChunkStream = if self.hang_after_chunks {
            Box::pin(head.chain(stream::pending()))
        } else {
            Box::pin(head)
        };
        Ok(Box::new(ChatCompletionStream::new(
            "test",
            &self.model,
            chunks,
            handler,
            None,
            cancel,
        )))
    }
}

// ---- chunk builders -------------------------------------------------------

pub fn text_chunk(content: &str) -> ChatChunk {
    ChatChunk {
        choices: vec![ChunkChoice {
            delta: ChunkDelta {
                content: Some(content.to_string()),
                ..Default::default()
            },
            finish_reason: None,
        }],
        usage: None,
    }
}

pub fn reasoning_chunk(text: &str) -> ChatChunk {
    ChatChunk {
        choices: vec![ChunkChoice {
            delta: ChunkDelta {
                reasoning: Some(text.to_string()),
                ..Default::default()
            },
            finish_reason: None,
        }],
        usage: None,
    }
}

pub fn tool_chunk(index: u32, id: &str, name: &str, args: &str) -> ChatChunk {
    ChatChunk {
        choices: vec![ChunkChoice {
            delta: ChunkDelta {
                tool_calls: vec![ChunkToolCall {
                    index,
                    id: id.to_string(),
                    function: ChunkFunction {
                        name: name.to_string(),
                        arguments: args.to_string(),
                    },
                }],
                ..Default::default()
            },
            finish_reason: None,
        }],
        usage: None,
    }
}

pub fn finish_chunk(reason: &str) -> ChatChunk {
    ChatChunk {
        choices: vec![ChunkChoice {
            delta: ChunkDelta::default(),
            finish_reason: Some(reason.to_string()),
        }],
        usage: None,
    }
}

pub fn usage_chunk(prompt: u64, completion: u64, total: u64) -> ChatChunk {
    ChatChunk {
        choices: vec![],
        usage: Some(WireUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total,
            prompt_tokens_details: None,
        }),
    }
}

// ---- message builders -----------------------------------------------------

pub fn assistant_with_calls(calls: Vec<(&str, &str, &str)>) -> AssistantMessage {
    let parts = calls
        .into_iter()
        .map(|(call_id, name, args)| {
            Part::ToolCall(ToolCallPart {
                call_id: call_id.to_string(),
                name: name.to_string(),
                args_json: args.to_string(),
            })
        })
        .collect();
    AssistantMessage {
        parts,
        timestamp: Utc::now(),
        usage: None,
        stop_reason: StopReason::ToolUse,
    }
}

pub fn assistant_text(text: &str) -> AssistantMessage {
    AssistantMessage {
        parts: vec![Part::Text(TextPart {
            text: text.to_string(),
        })],
        timestamp: Utc::now(),
        usage: None,
        stop_reason: StopReason::Stop,
    }
}

pub fn message_update(message: AssistantMessage) -> ProviderUpdate {
    ProviderUpdate::Message(message)
}

// ---- tools ----------------------------------------------------------------

/// Adds two numbers; rejects unparseable arguments.
pub struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "add".to_string(),
            description: "Add two numbers together".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "a": {"type": "number"},
                    "b": {"type": "number"},
                },
                "required": ["a", "b"],
            }),
            parallel: false,
        }
    }

    async fn execute(
        &self,
        _cancel: CancellationToken,
        call: &ToolCallPart,
    ) -> Result<ToolResult, StepError> {
        #[derive(serde::Deserialize)]
        struct Args {
            a: f64,
            b: f64,
        }
        let args: Args = serde_json::from_str(&call.args_json)
            .map_err(|err| StepError::tool("add", format!("invalid arguments: {err}")))?;
        Ok(ToolResult::text(format!("{:.2}", args.a + args.b)))
    }
}

/// A start/end event recorded by tracing tools.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub tool: String,
    pub phase: &'static str,
    pub at: Instant,
}

pub type TraceLog = Arc<Mutex<Vec<TraceEvent>>>;

pub fn trace_log() -> TraceLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn trace_span(log: &TraceLog, tool: &str) -> (Option<Instant>, Option<Instant>) {
    let events = log.lock().expect("trace lock");
    let start = events
        .iter()
        .find(|e| e.tool == tool && e.phase == "start")
        .map(|e| e.at);
    let end = events
        .iter()
        .find(|e| e.tool == tool && e.phase == "end")
        .map(|e| e.at);
    (start, end)
}

/// Sleeps for a fixed duration, recording execution boundaries.
pub struct TracingTool {
    name: String,
    parallel: bool,
    delay: Duration,
    log: TraceLog,
}

impl TracingTool {
    pub fn new(name: &str, parallel: bool, delay_ms: u64, log: TraceLog) -> Self {
        Self {
            name: name.to_string(),
            parallel,
            delay: Duration::from_millis(delay_ms),
            log,
        }
    }
}

#[async_trait]
impl Tool for TracingTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: format!("tracing tool {}", self.name),
            parameters: json!({"type": "object", "properties": {}}),
            parallel: self.parallel,
        }
    }

    async fn execute(
        &self,
        cancel: CancellationToken,
        _call: &ToolCallPart,
    ) -> Result<ToolResult, StepError> {
        self.log.lock().expect("trace lock").push(TraceEvent {
            tool: self.name.clone(),
            phase: "start",
            at: Instant::now(),
        });
        tokio::select! {
            _ = cancel.cancelled() => {
                self.log.lock().expect("trace lock").push(TraceEvent {
                    tool: self.name.clone(),
                    phase: "cancelled",
                    at: Instant::now(),
                });
                return Err(StepError::Cancelled);
            }
            _ = tokio::time::sleep(self.delay) => {}
        }
        self.log.lock().expect("trace lock").push(TraceEvent {
            tool: self.name.clone(),
            phase: "end",
            at: Instant::now(),
        });
        Ok(ToolResult::text(format!("{} done", self.name)))
    }
}

/// Fails with a fixed execution error.
pub struct FailTool {
    name: String,
}

impl FailTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: "always fails".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
            parallel: false,
        }
    }

    async fn execute(
        &self,
        _cancel: CancellationToken,
        _call: &ToolCallPart,
    ) -> Result<ToolResult, StepError> {
        Err(StepError::tool(&self.name, "deliberate failure"))
    }
}

/// Cancels the step's own token, then succeeds.
pub struct CancelStepTool {
    token: CancellationToken,
}

impl CancelStepTool {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl Tool for CancelStepTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "pull_plug".to_string(),
            description: "cancels the surrounding step".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
            parallel: false,
        }
    }

    async fn execute(
        &self,
        _cancel: CancellationToken,
        _call: &ToolCallPart,
    ) -> Result<ToolResult, StepError> {
        self.token.cancel();
        Ok(ToolResult::text("plug pulled"))
    }
}

// ---- misc helpers ---------------------------------------------------------

pub fn collect_deltas() -> (Arc<Mutex<Vec<stride::Delta>>>, stride::StepOptions) {
    let log: Arc<Mutex<Vec<stride::Delta>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let opts = stride::StepOptions::new().on_delta(move |delta| {
        sink.lock().expect("delta lock").push(delta.clone());
    });
    (log, opts)
}

pub fn tool_result_messages(messages: &[Message]) -> Vec<&stride::ToolResultMessage> {
    messages
        .iter()
        .filter_map(|msg| match msg {
            Message::Tool(m) => Some(m),
            _ => None,
        })
        .collect()
}
