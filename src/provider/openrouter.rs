//! OpenRouter provider (chat-completion family).
//!
//! OpenRouter fronts many upstream models behind the chat-completion wire
//! format and reports reasoning through the structured `reasoning_details`
//! dialect, so this provider pairs the shared stream adapter with
//! [`DetailReasoning`].

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StepError;
use crate::provider::debug::DebugRecord;
use crate::provider::{Provider, ProviderRequest, ProviderStream};

use super::chat_completion::reasoning::ReasoningHandler;
use super::chat_completion::reasoning_details::DetailReasoning;
use super::chat_completion::stream::ChatCompletionStream;
use super::chat_completion::{input, open_chunk_stream, open_debug_sink};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Effort level for reasoning models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningEffort {
    XHigh,
    High,
    Medium,
    Low,
    Minimal,
    None,
}

impl ReasoningEffort {
    fn as_str(&self) -> &'static str {
        match self {
            Self::XHigh => "xhigh",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Minimal => "minimal",
            Self::None => "none",
        }
    }
}

/// Output verbosity for models that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    High,
    Medium,
    Low,
}

impl Verbosity {
    fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Sorting strategy for OpenRouter's upstream routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSort {
    Price,
    Throughput,
    Latency,
}

impl ProviderSort {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Throughput => "throughput",
            Self::Latency => "latency",
        }
    }
}

/// Upstream routing preferences.
#[derive(Debug, Clone, Default)]
pub struct ProviderRouting {
    pub order: Vec<String>,
    pub only: Vec<String>,
    pub ignore: Vec<String>,
    pub sort: Option<ProviderSort>,
}

/// Provider for the OpenRouter API.
///
/// Reads `OPENROUTER_API_KEY` from the environment when not set explicitly;
/// the base URL is fixed to the OpenRouter endpoint.
pub struct OpenRouterProvider {
    model: String,
    api_key: String,
    temperature: Option<f64>,
    max_output_tokens: Option<u32>,
    thinking_budget: Option<u32>,
    reasoning_effort: Option<ReasoningEffort>,
    verbosity: Option<Verbosity>,
    routing: Option<ProviderRouting>,
    extra_headers: Vec<(String, String)>,
    extra_body: Vec<(String, Value)>,
    debug_path: Option<String>,
}

impl OpenRouterProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: std::env::var("OPENROUTER_API_KEY").unwrap_or_default(),
            temperature: None,
            max_output_tokens: None,
            thinking_budget: None,
            reasoning_effort: None,
            verbosity: None,
            routing: None,
            extra_headers: Vec::new(),
            extra_body: Vec::new(),
            debug_path: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Enable a thinking budget for Anthropic models. Takes precedence over
    /// `with_reasoning_effort`.
    pub fn with_thinking_budget(mut self, max_tokens: u32) -> Self {
        self.thinking_budget = Some(max_tokens);
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = Some(verbosity);
        self
    }

    pub fn with_routing(mut self, routing: ProviderRouting) -> Self {
        self.routing = Some(routing);
        self
    }

    pub fn with_extra_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((key.into(), value.into()));
        self
    }

    pub fn with_extra_body(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_body.push((key.into(), value));
        self
    }

    /// Enable JSONL debug logging to the given file path.
    pub fn with_debug_path(mut self, path: impl Into<String>) -> Self {
        self.debug_path = Some(path.into());
        self
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    async fn stream(
        &self,
        cancel: CancellationToken,
        req: ProviderRequest,
    ) -> Result<Box<dyn ProviderStream>, StepError> {
        let handler: Box<dyn ReasoningHandler> = Box::new(DetailReasoning::new(&self.model));
        // Prompt caching applies to Claude and Gemini upstreams.
        let use_cache_control = is_claude_model(&self.model) || is_gemini_model(&self.model);

        let mut body =
            input::build_request_body(&req, handler.as_ref(), &self.model, use_cache_control);
        let obj = body.as_object_mut().expect("body is an object");
        obj.insert("model".into(), Value::String(self.model.clone()));
        if let Some(temperature) = self.temperature {
            obj.insert("temperature".into(), temperature.into());
        }
        if let Some(max_tokens) = self.max_output_tokens {
            obj.insert("max_tokens".into(), max_tokens.into());
        }
        // Cache-token accounting arrives in the final usage chunk.
        obj.insert("usage".into(), json!({"include": true}));

        if let Some(budget) = self.thinking_budget {
            obj.insert(
                "reasoning".into(),
                json!({"enable": true, "max_tokens": budget}),
            );
        } else if let Some(effort) = self.reasoning_effort {
            obj.insert("reasoning".into(), json!({"effort": effort.as_str()}));
        }
        if let Some(verbosity) = self.verbosity {
            obj.insert("verbosity".into(), json!(verbosity.as_str()));
        }
        if let Some(routing) = &self.routing {
            let mut preferences = serde_json::Map::new();
            if !routing.order.is_empty() {
                preferences.insert("order".into(), json!(routing.order));
            }
            if !routing.only.is_empty() {
                preferences.insert("only".into(), json!(routing.only));
            }
            if !routing.ignore.is_empty() {
                preferences.insert("ignore".into(), json!(routing.ignore));
            }
            if let Some(sort) = routing.sort {
                preferences.insert("sort".into(), json!(sort.as_str()));
            }
            if !preferences.is_empty() {
                obj.insert("provider".into(), Value::Object(preferences));
            }
        }
        for (key, value) in &self.extra_body {
            obj.insert(key.clone(), value.clone());
        }

        let mut headers = self.extra_headers.clone();
        if is_claude_model(&self.model) {
            headers.push((
                "x-anthropic-beta".to_string(),
                "fine-grained-tool-streaming-2025-05-14,interleaved-thinking-2025-05-14"
                    .to_string(),
            ));
        }

        let debug_sink = open_debug_sink(self.debug_path.as_deref())?;
        if let Some(sink) = &debug_sink {
            sink.log(&DebugRecord::new("request", &body).with_source("openrouter", &self.model));
        }

        debug!(model = %self.model, "openrouter stream");
        let chunks = open_chunk_stream(DEFAULT_BASE_URL, &self.api_key, &headers, body).await?;
        Ok(Box::new(ChatCompletionStream::new(
            "openrouter",
            &self.model,
            chunks,
            handler,
            debug_sink,
            cancel,
        )))
    }
}

fn is_claude_model(model: &str) -> bool {
    model.to_lowercase().contains("claude")
}

fn is_gemini_model(model: &str) -> bool {
    model.to_lowercase().contains("gemini")
}
