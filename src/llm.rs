//! # Text Generation
//!
//! The [`TextGenerator`] trait is the pipeline's only view of an LLM. The
//! bundled implementation, [`OpenAiCompatClient`], talks to any endpoint
//! that serves the OpenAI chat completions API (OpenAI, Ollama, vLLM,
//! LM Studio, OpenRouter, ...).
//!
//! Streaming requests read server-sent events and return the concatenated
//! deltas, so callers always get the full text back.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{require, Config, LLM_API_KEY, LLM_ENDPOINT, LLM_MODEL_ID};
use crate::error::{ResearchError, Service, UpstreamError};

/// Produces text from a system prompt and a user prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion.
    ///
    /// `streaming` is a transport hint; the returned text is complete
    /// either way.
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        streaming: bool,
    ) -> Result<String, ResearchError>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiCompatClient {
    /// Create a client for the given endpoint base URL (e.g.
    /// `https://api.openai.com/v1`), API key and model id.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            timeout: Duration::from_secs(120),
        }
    }

    /// Build from configuration, failing if endpoint, key or model is unset.
    pub fn from_config(config: &Config) -> Result<Self, ResearchError> {
        let endpoint = require(&config.llm_endpoint, LLM_ENDPOINT)?;
        let api_key = require(&config.llm_api_key, LLM_API_KEY)?;
        let model = require(&config.llm_model_id, LLM_MODEL_ID)?;

        Ok(Self::new(endpoint, api_key, model)
            .with_temperature(config.temperature)
            .with_timeout(Duration::from_secs(config.request_timeout_secs)))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response, UpstreamError> {
        let url = self.completions_url();
        debug!(url = %url, model = %self.model, stream = request.stream, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(UpstreamError::from_status(status, body))
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, UpstreamError> {
        let response: ChatResponse = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| UpstreamError::Decode("response contained no message content".into()))
    }

    async fn complete_streaming(&self, request: &ChatRequest<'_>) -> Result<String, UpstreamError> {
        let response = self.send(request).await?;
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut decoder = SseDecoder::default();

        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                if decoder.feed_line(&line)? {
                    return Ok(decoder.text);
                }
            }
        }

        // Some servers close the stream without a trailing newline or [DONE].
        if !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer).into_owned();
            decoder.feed_line(&line)?;
        }

        Ok(decoder.text)
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        streaming: bool,
    ) -> Result<String, ResearchError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
            stream: streaming,
        };

        let result = if streaming {
            self.complete_streaming(&request).await
        } else {
            self.complete(&request).await
        };

        let text = result.map_err(|e| ResearchError::upstream(Service::TextGeneration, e))?;
        info!(model = %self.model, chars = text.len(), streaming, "Completion received");
        Ok(text)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Accumulates `data:` lines of a chat completions event stream.
#[derive(Debug, Default)]
struct SseDecoder {
    text: String,
}

impl SseDecoder {
    /// Consume one line. Returns `Ok(true)` once `[DONE]` is seen.
    fn feed_line(&mut self, line: &str) -> Result<bool, UpstreamError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(data) = line.strip_prefix("data:") else {
            // Blank separators, comments (": keep-alive") and event names.
            return Ok(false);
        };
        let data = data.trim_start();

        if data == "[DONE]" {
            return Ok(true);
        }

        let chunk: StreamChunk = serde_json::from_str(data)
            .map_err(|e| UpstreamError::Decode(format!("invalid stream chunk: {}", e)))?;

        if let Some(error) = chunk.error {
            return Err(UpstreamError::Provider(error.to_string()));
        }

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                self.text.push_str(&content);
            }
        }
        Ok(false)
    }
}
