//! Stride -- provider-agnostic runtime for one turn of a tool-using agent.
//!
//! A single turn (a *step*) sends the conversation and tool catalog to a
//! streaming LLM backend, assembles the provider's chunked response into one
//! canonical assistant message, executes any requested tools, and returns the
//! ordered suffix of new conversation messages.
//!
//! The crate is organized around four pieces:
//!
//! - [`step::step`] drives one turn end to end.
//! - [`provider::Provider`] / [`provider::ProviderStream`] is the normalized
//!   contract any backend adapter implements.
//! - [`provider::chat_completion`] adapts the chunked chat-completion wire
//!   format (including provider-specific reasoning dialects) to that contract.
//! - [`tools::Tool`] is the executable surface the model can call into.
//!
//! Cancellation is cooperative throughout: cancelling the step's
//! [`CancellationToken`](tokio_util::sync::CancellationToken) finalizes a
//! partial assistant message and synthesizes interrupted tool results, so
//! callers always receive a structurally complete result.

pub mod error;
pub mod provider;
pub mod step;
pub mod tools;
pub mod types;

pub use error::{Result, StepError};
pub use provider::{Provider, ProviderRequest, ProviderStream, ProviderUpdate};
pub use step::{step, StepOptions, StepRequest, StepResult};
pub use tools::{Tool, ToolResult, ToolSpec};
pub use types::*;
