//! Chat-completion style provider adapter
//!
//! Builds a single message list (system-role message prepended when a
//! system prompt is set, then all history turns in order), issues a
//! streaming request, and maps each inbound chunk carrying a content delta
//! to one fragment. Chunks without a content delta are skipped, not
//! errors.

use crate::config::CompletionSettings;
use crate::errors::ProviderError;
use crate::streaming::sse::SseParser;
use crate::streaming::{FragmentStream, ProviderAdapter};
use crate::types::{ModelDescriptor, Role, StreamFragment, Turn};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Terminator payload closing the event stream
const DONE_MARKER: &str = "[DONE]";

/// Streaming client for chat-completion backends
#[derive(Debug, Clone)]
pub struct CompletionAdapter {
    client: Client,
    settings: CompletionSettings,
}

impl CompletionAdapter {
    /// Create an adapter over the supplied connection settings
    pub fn new(settings: CompletionSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    /// Build the wire request body
    fn build_request<'a>(
        model: &'a ModelDescriptor,
        system_prompt: Option<&'a str>,
        history: &'a [Turn],
        token_limit: u32,
    ) -> CompletionRequest<'a> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = system_prompt.filter(|p| !p.is_empty()) {
            messages.push(WireMessage {
                role: Role::System.as_str(),
                content: prompt,
            });
        }
        messages.extend(history.iter().map(|turn| WireMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        }));

        CompletionRequest {
            model: &model.backend_model_name,
            messages,
            stream: true,
            max_tokens: token_limit,
        }
    }

    /// Decode one SSE payload into at most one fragment
    fn decode_chunk(payload: &str) -> Result<Option<StreamFragment>, ProviderError> {
        let chunk: CompletionChunk = serde_json::from_str(payload)?;

        let text = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content);

        Ok(text.map(StreamFragment::new))
    }
}

#[async_trait]
impl ProviderAdapter for CompletionAdapter {
    async fn stream(
        &self,
        model: &ModelDescriptor,
        system_prompt: Option<&str>,
        history: &[Turn],
        token_limit: u32,
    ) -> Result<FragmentStream, ProviderError> {
        let body = Self::build_request(model, system_prompt, history, token_limit);
        let url = format!("{}/chat/completions", self.settings.base_url);

        tracing::debug!(
            model = %model.backend_model_name,
            turns = history.len(),
            token_limit,
            "dispatching completion stream request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "completion request rejected");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut parser = SseParser::new();

            'wire: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(ProviderError::Transport)?;
                for payload in parser.push_bytes(&chunk)? {
                    if payload == DONE_MARKER {
                        break 'wire;
                    }
                    if let Some(fragment) = Self::decode_chunk(&payload)? {
                        yield fragment;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Wire request body
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    max_tokens: u32,
}

/// One message entry shared by both request protocols
#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// Inbound stream chunk; only the content delta matters here
#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}
