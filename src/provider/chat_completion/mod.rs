//! OpenAI-compatible chat-completion provider.

pub(crate) mod input;
pub mod reasoning;
pub mod reasoning_details;
pub mod stream;
pub mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StepError;
use crate::provider::debug::{DebugRecord, DebugSink};
use crate::provider::http::{bearer_headers, parse_sse_data, shared_client, status_to_error};
use crate::provider::{Provider, ProviderRequest, ProviderStream};

use reasoning::{ReasoningHandler, TextReasoning};
use stream::{ChatCompletionStream, ChunkStream};
use wire::ChatChunk;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider for any OpenAI-compatible chat-completion endpoint.
///
/// Reads `OPENAI_API_KEY` and `OPENAI_BASE_URL` from the environment when
/// not set explicitly.
pub struct ChatCompletionProvider {
    model: String,
    api_key: String,
    base_url: String,
    temperature: Option<f64>,
    max_output_tokens: Option<u32>,
    extra_headers: Vec<(String, String)>,
    extra_body: Vec<(String, Value)>,
    debug_path: Option<String>,
}

impl ChatCompletionProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            temperature: None,
            max_output_tokens: None,
            extra_headers: Vec::new(),
            extra_body: Vec::new(),
            debug_path: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
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
impl Provider for ChatCompletionProvider {
    async fn stream(
        &self,
        cancel: CancellationToken,
        req: ProviderRequest,
    ) -> Result<Box<dyn ProviderStream>, StepError> {
        let handler: Box<dyn ReasoningHandler> = Box::new(TextReasoning::new(&self.model));

        let mut body = input::build_request_body(&req, handler.as_ref(), &self.model, false);
        let obj = body.as_object_mut().expect("body is an object");
        obj.insert("model".into(), Value::String(self.model.clone()));
        if let Some(temperature) = self.temperature {
            obj.insert("temperature".into(), temperature.into());
        }
        if let Some(max_tokens) = self.max_output_tokens {
            obj.insert("max_tokens".into(), max_tokens.into());
        }
        for (key, value) in &self.extra_body {
            obj.insert(key.clone(), value.clone());
        }

        let debug_sink = open_debug_sink(self.debug_path.as_deref())?;
        if let Some(sink) = &debug_sink {
            sink.log(&DebugRecord::new("request", &body).with_source("chatcompletion", &self.model));
        }

        debug!(model = %self.model, "chat-completion stream");
        let chunks =
            open_chunk_stream(&self.base_url, &self.api_key, &self.extra_headers, body).await?;
        Ok(Box::new(ChatCompletionStream::new(
            "chatcompletion",
            &self.model,
            chunks,
            handler,
            debug_sink,
            cancel,
        )))
    }
}

pub(crate) fn open_debug_sink(path: Option<&str>) -> Result<Option<Arc<DebugSink>>, StepError> {
    match path {
        Some(path) if !path.is_empty() => Ok(Some(Arc::new(DebugSink::open(path)?))),
        _ => Ok(None),
    }
}

/// POST the request and adapt the SSE response into a typed chunk stream.
/// Unparseable data lines (keep-alives, vendor noise) are skipped.
pub(crate) async fn open_chunk_stream(
    base_url: &str,
    api_key: &str,
    extra_headers: &[(String, String)],
    body: Value,
) -> Result<ChunkStream, StepError> {
    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

    let mut headers = bearer_headers(api_key);
    for (key, value) in extra_headers {
        if let (Ok(name), Ok(val)) = (
            reqwest::header::HeaderName::from_bytes(key.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            headers.insert(name, val);
        }
    }

    let resp = shared_client()
        .post(&url)
        .headers(headers)
        .json(&body)
        .send()
        .await?;

    let status = resp.status().as_u16();
    if status != 200 {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(status_to_error(status, &body_text));
    }

    let byte_stream = resp.bytes_stream();
    let chunks = async_stream::stream! {
        let mut buffer = String::new();
        futures::pin_mut!(byte_stream);

        while let Some(bytes) = byte_stream.next().await {
            let bytes = match bytes {
                Ok(bytes) => bytes,
                Err(err) => {
                    yield Err(StepError::Network(err));
                    break;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer.drain(..=line_end);

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let Some(data) = parse_sse_data(&line) else {
                    continue;
                };
                if let Ok(chunk) = serde_json::from_str::<ChatChunk>(data) {
                    yield Ok(chunk);
                }
            }
        }
    };

    Ok(Box::pin(chunks))
}
