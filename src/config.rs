//! Connection settings supplied by the credentials collaborator
//!
//! The engine never reads the environment or config files itself; whoever
//! embeds it loads credentials and hands them over through these structs.

/// Default per-request token limit when the caller has no opinion
///
/// Matches the stock limit of the surrounding application (range 1..=10000).
pub const DEFAULT_TOKEN_LIMIT: u32 = 4096;

/// Default chat-completion API endpoint
pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.openai.com/v1";

/// Settings for the chat-completion style provider
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    /// Bearer token sent in the Authorization header
    pub api_key: String,

    /// Endpoint base, without the trailing `/chat/completions` path
    pub base_url: String,
}

impl CompletionSettings {
    /// Settings against the default endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
        }
    }

    /// Settings against a custom endpoint (test servers, proxies)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

/// Settings for the managed-model event-stream provider
#[derive(Debug, Clone)]
pub struct EventStreamSettings {
    /// AWS access key id used for request signing
    pub access_key_id: String,

    /// AWS secret access key used for request signing
    pub secret_access_key: String,

    /// Region the runtime endpoint lives in (e.g. `us-east-1`)
    pub region: String,
}

impl EventStreamSettings {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    /// Runtime host for this region
    pub fn host(&self) -> String {
        format!("bedrock-runtime.{}.amazonaws.com", self.region)
    }
}
