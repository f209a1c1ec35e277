//! Managed-model event-stream provider adapter
//!
//! Builds a versioned request body from the history turns and the token
//! limit, signs it with the supplied key pair, and decodes the binary
//! event-stream response one frame at a time. Each `chunk` frame wraps a
//! base64 payload whose JSON carries `content[0].text`; that text segment
//! becomes one fragment. Any malformed event fails the stream for this
//! model only.
//!
//! This protocol has no system-role field: a non-empty system prompt is
//! silently dropped (documented limitation, logged at debug).

use crate::config::EventStreamSettings;
use crate::errors::ProviderError;
use crate::streaming::completion::WireMessage;
use crate::streaming::frame::EventFrameParser;
use crate::streaming::sigv4;
use crate::streaming::{FragmentStream, ProviderAdapter};
use crate::types::{ModelDescriptor, StreamFragment, Turn};
use async_trait::async_trait;
use base64::Engine;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Fixed protocol-version tag sent with every request
pub const PROTOCOL_VERSION: &str = "bedrock-2023-05-31";

/// Signing service name for the runtime endpoint
const SERVICE: &str = "bedrock";

/// Streaming client for managed-model event-stream backends
#[derive(Debug, Clone)]
pub struct EventStreamAdapter {
    client: Client,
    settings: EventStreamSettings,
}

impl EventStreamAdapter {
    /// Create an adapter over the supplied connection settings
    pub fn new(settings: EventStreamSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    /// Build the wire request body from the history turns
    fn build_request<'a>(history: &'a [Turn], token_limit: u32) -> EventStreamRequest<'a> {
        EventStreamRequest {
            messages: history
                .iter()
                .map(|turn| WireMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
            max_tokens: token_limit,
            anthropic_version: PROTOCOL_VERSION,
        }
    }

    /// Invocation path for a model, with the id percent-encoded so the
    /// wire form and the canonical form agree
    fn invoke_path(model: &ModelDescriptor) -> String {
        format!(
            "/model/{}/invoke-with-response-stream",
            sigv4::uri_encode(&model.backend_model_name)
        )
    }

    /// Decode one frame payload into its text segment
    fn decode_event(payload: &[u8]) -> Result<StreamFragment, ProviderError> {
        let wrapper: ChunkEnvelope = serde_json::from_slice(payload)?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&wrapper.bytes)
            .map_err(|e| ProviderError::MalformedEvent(format!("invalid base64 payload: {}", e)))?;

        let event: serde_json::Value = serde_json::from_slice(&decoded)?;
        let text = event
            .get("content")
            .and_then(|content| content.get(0))
            .and_then(|block| block.get("text"))
            .and_then(|text| text.as_str())
            .ok_or_else(|| {
                ProviderError::MalformedEvent("event payload missing content[0].text".to_string())
            })?;

        Ok(StreamFragment::new(text))
    }
}

#[async_trait]
impl ProviderAdapter for EventStreamAdapter {
    async fn stream(
        &self,
        model: &ModelDescriptor,
        system_prompt: Option<&str>,
        history: &[Turn],
        token_limit: u32,
    ) -> Result<FragmentStream, ProviderError> {
        if system_prompt.is_some_and(|p| !p.is_empty()) {
            tracing::debug!(
                model = %model.id,
                "event-stream protocol has no system role; dropping system prompt"
            );
        }

        let body = Self::build_request(history, token_limit);
        let payload = serde_json::to_vec(&body)?;

        let host = self.settings.host();
        let path = Self::invoke_path(model);
        let url = format!("https://{}{}", host, path);
        let amz_date = sigv4::amz_date_now();
        let content_hash = sigv4::payload_hash(&payload);

        let authorization = sigv4::authorization_header(&sigv4::SigningRequest {
            access_key_id: &self.settings.access_key_id,
            secret_access_key: &self.settings.secret_access_key,
            region: &self.settings.region,
            service: SERVICE,
            amz_date: &amz_date,
            method: "POST",
            host: &host,
            path: &path,
            query: "",
            headers: &[
                ("content-type", "application/json"),
                ("x-amz-content-sha256", &content_hash),
            ],
            payload: &payload,
        });

        tracing::debug!(
            model = %model.backend_model_name,
            turns = history.len(),
            token_limit,
            "dispatching event-stream request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", authorization)
            .header("Content-Type", "application/json")
            .header("X-Amz-Date", amz_date)
            .header("X-Amz-Content-Sha256", content_hash)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "event-stream request rejected");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut parser = EventFrameParser::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(ProviderError::Transport)?;
                for frame in parser.push_bytes(&chunk)? {
                    if frame.is_exception {
                        let detail = String::from_utf8_lossy(&frame.payload).to_string();
                        Err::<StreamFragment, _>(ProviderError::Fault(format!(
                            "{}: {}",
                            frame.event_type, detail
                        )))?;
                    }
                    if frame.event_type == "chunk" {
                        yield Self::decode_event(&frame.payload)?;
                    } else {
                        tracing::debug!(event_type = %frame.event_type, "skipping non-chunk frame");
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Wire request body; the model identifier travels in the URL, not here
#[derive(Debug, Serialize)]
struct EventStreamRequest<'a> {
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    anthropic_version: &'a str,
}

/// A `chunk` frame's payload: base64-wrapped inner event
#[derive(Debug, Deserialize)]
struct ChunkEnvelope {
    bytes: String,
}
