//! Step orchestration: one provider turn plus tool execution.

mod executor;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StepError;
use crate::provider::{Provider, ProviderRequest, ProviderUpdate};
use crate::tools::Tool;
use crate::types::{
    AssistantMessage, Delta, Message, StepStatusDelta, ToolCallPart, ToolResultMessage,
};

/// Callback invoked for every streaming delta.
pub type DeltaCallback = Arc<dyn Fn(&Delta) + Send + Sync>;
/// Callback invoked for every finalized message.
pub type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Configuration for one step.
#[derive(Clone, Default)]
pub struct StepRequest {
    pub provider: Option<Arc<dyn Provider>>,
    pub system_prompt: String,
    pub history: Vec<Message>,
    pub tools: Vec<Arc<dyn Tool>>,
}

impl StepRequest {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider: Some(provider),
            ..Default::default()
        }
    }
}

/// Optional observation hooks for one step.
///
/// Callbacks run synchronously on the step's own task and must not block;
/// none is invoked after [`step`] returns.
#[derive(Clone, Default)]
pub struct StepOptions {
    on_delta: Option<DeltaCallback>,
    on_message: Option<MessageCallback>,
}

impl StepOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_delta(mut self, callback: impl Fn(&Delta) + Send + Sync + 'static) -> Self {
        self.on_delta = Some(Arc::new(callback));
        self
    }

    pub fn on_message(mut self, callback: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(callback));
        self
    }
}

/// The ordered suffix of new conversation messages produced by one step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The assistant message followed by one tool result per tool call, in
    /// call order.
    pub messages: Vec<Message>,
    /// Whether the step was cancelled. A cancelled step still yields a
    /// structurally complete result: a (possibly partial) assistant message
    /// and one result message per tool call.
    pub cancelled: bool,
}

impl StepResult {
    pub fn assistant(&self) -> Option<&AssistantMessage> {
        match self.messages.first() {
            Some(Message::Assistant(m)) => Some(m),
            _ => None,
        }
    }

    pub fn tool_results(&self) -> Vec<&ToolResultMessage> {
        self.messages
            .iter()
            .filter_map(|msg| match msg {
                Message::Tool(m) => Some(m),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone, Default)]
pub(crate) struct StepEmitter {
    on_delta: Option<DeltaCallback>,
    on_message: Option<MessageCallback>,
}

impl StepEmitter {
    pub(crate) fn delta(&self, delta: &Delta) {
        if let Some(callback) = &self.on_delta {
            callback(delta);
        }
    }

    pub(crate) fn message(&self, message: &Message) {
        if let Some(callback) = &self.on_message {
            callback(message);
        }
    }
}

/// Run one step: stream the assistant turn, then execute requested tools.
///
/// Provider errors are fatal and surface as `Err`. Tool failures are not:
/// they materialize as error tool-result messages so the model can observe
/// them next turn. Cancellation yields `Ok` with
/// [`StepResult::cancelled`] set and every tool call answered by an
/// interrupted result.
pub async fn step(
    cancel: &CancellationToken,
    req: StepRequest,
    opts: StepOptions,
) -> Result<StepResult, StepError> {
    let Some(provider) = req.provider.clone() else {
        return Err(StepError::NoProvider);
    };
    let emitter = StepEmitter {
        on_delta: opts.on_delta,
        on_message: opts.on_message,
    };

    let provider_req = ProviderRequest {
        system_prompt: req.system_prompt.clone(),
        history: req.history.clone(),
        tools: req.tools.iter().map(|tool| tool.spec()).collect(),
    };

    let mut stream = provider.stream(cancel.clone(), provider_req).await?;

    let mut assistant: Option<AssistantMessage> = None;
    loop {
        match stream.next().await {
            Ok(Some(ProviderUpdate::Delta(delta))) => emitter.delta(&delta),
            Ok(Some(ProviderUpdate::Message(message))) => {
                emitter.message(&Message::Assistant(message.clone()));
                assistant = Some(message);
            }
            Ok(None) => break,
            Err(err) => {
                stream.close().await;
                return Err(err);
            }
        }
    }
    stream.close().await;

    let Some(assistant) = assistant else {
        return Err(StepError::NoAssistantMessage);
    };

    let calls: Vec<ToolCallPart> = assistant.tool_calls().into_iter().cloned().collect();
    debug!(
        tool_calls = calls.len(),
        text_len = assistant.text().len(),
        stop_reason = ?assistant.stop_reason,
        "assistant message finalized"
    );

    let mut messages = vec![Message::Assistant(assistant)];
    messages.extend(executor::execute_tools(cancel, &calls, &req.tools, &emitter).await);

    let cancelled = cancel.is_cancelled();
    emitter.delta(&Delta::StepStatus(StepStatusDelta { cancelled }));
    Ok(StepResult {
        messages,
        cancelled,
    })
}
