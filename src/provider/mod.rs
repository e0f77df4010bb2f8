//! Provider contract and implementations.

pub mod chat_completion;
pub mod debug;
pub mod http;
pub mod openrouter;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::tools::ToolSpec;
use crate::types::{AssistantMessage, Delta, Message};

/// Provider-agnostic request for one assistant turn.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub system_prompt: String,
    pub history: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

/// A single normalized update pulled from a provider stream.
#[derive(Debug, Clone)]
pub enum ProviderUpdate {
    /// A streaming delta, forwarded to the caller and then discarded.
    Delta(Delta),
    /// The finalized assistant message. Exactly one per successful stream,
    /// delivered after every delta that pertains to it.
    Message(AssistantMessage),
}

/// A streaming LLM backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Open a streaming generation. The token governs the whole pull: when
    /// it fires, the stream finalizes a partial assistant message and ends.
    async fn stream(
        &self,
        cancel: CancellationToken,
        req: ProviderRequest,
    ) -> Result<Box<dyn ProviderStream>, StepError>;
}

/// Pull-based access to one streaming generation.
#[async_trait]
pub trait ProviderStream: Send {
    /// Pull the next update, blocking until one is available or the stream
    /// terminates. `Ok(None)` signals end of stream. Transport errors are
    /// fatal: after an `Err` no message update is produced.
    async fn next(&mut self) -> Result<Option<ProviderUpdate>, StepError>;

    /// Release the transport and any debug sink. Idempotent; subsequent
    /// `next` calls report end of stream.
    async fn close(&mut self);
}
