//! Streaming chat completion backend.
//!
//! [`CompletionService`] is the seam the chat service talks through;
//! [`OllamaClient`] is the production implementation, streaming NDJSON
//! chunks from an Ollama server's `/api/chat` endpoint.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::models::LlmMessage;

/// System prompt framing the assistant as a shopping helper.
pub const SYSTEM_PROMPT: &str = "You are a helpful shopping assistant for an online store. \
Answer questions about products, orders and shipping concisely and honestly. \
If you do not know something, say so instead of guessing.";

/// Errors from the completion backend.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The HTTP request to the backend failed.
    #[error("completion backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("completion backend returned {status}: {message}")]
    Backend {
        status: reqwest::StatusCode,
        message: String,
    },

    /// A stream chunk could not be parsed.
    #[error("unparseable completion chunk: {0}")]
    Parse(String),
}

/// Token-streaming completion backend.
///
/// `complete` drives `on_token` once per emitted fragment and resolves
/// to the full assembled response text.
#[async_trait]
pub trait CompletionService: Send + Sync {
    // The callback is higher-ranked so it accepts borrows of per-chunk
    // buffers that live shorter than the call itself.
    async fn complete(
        &self,
        history: &[LlmMessage],
        on_token: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

/// Completion client for an Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// Create a client for `base_url` (e.g. `http://localhost:11434`)
    /// and a model name.
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn request_body<'a>(&'a self, history: &'a [LlmMessage]) -> OllamaChatRequest<'a> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(OllamaMessage {
            role: "system",
            content: SYSTEM_PROMPT,
        });
        messages.extend(history.iter().map(|message| OllamaMessage {
            role: message.role.as_str(),
            content: &message.content,
        }));
        OllamaChatRequest {
            model: &self.model,
            messages,
            stream: true,
        }
    }
}

/// Parse one NDJSON line from the Ollama stream.
///
/// Returns the token fragment (possibly empty) and whether the stream is
/// finished.
fn parse_chunk(line: &str) -> Result<(String, bool), CompletionError> {
    let chunk: OllamaChunk =
        serde_json::from_str(line).map_err(|e| CompletionError::Parse(format!("{e}: {line}")))?;
    if let Some(error) = chunk.error {
        return Err(CompletionError::Backend {
            status: reqwest::StatusCode::BAD_GATEWAY,
            message: error,
        });
    }
    let token = chunk.message.map(|m| m.content).unwrap_or_default();
    Ok((token, chunk.done))
}

#[async_trait]
impl CompletionService for OllamaClient {
    #[instrument(skip(self, history, on_token), fields(model = %self.model, turns = history.len()))]
    async fn complete(
        &self,
        history: &[LlmMessage],
        on_token: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String, CompletionError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&self.request_body(history))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CompletionError::Backend { status, message });
        }

        let mut byte_stream = std::pin::pin!(response.bytes_stream());
        let mut buffer = String::new();
        let mut full = String::new();

        while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk?;
            let text = std::str::from_utf8(&bytes)
                .map_err(|e| CompletionError::Parse(format!("invalid UTF-8 in stream: {e}")))?;
            buffer.push_str(text);

            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let (token, done) = parse_chunk(line)?;
                if !token.is_empty() {
                    on_token(&token);
                    full.push_str(&token);
                }
                if done {
                    return Ok(full);
                }
            }
        }

        Ok(full)
    }
}
