//! Error types for the chat orchestration engine
//!
//! Failures are isolated per model: a `ProviderError` raised while one
//! model's stream is in flight never cancels or corrupts another model's
//! request. The orchestrator wraps provider failures with the model id
//! before reporting them.

use thiserror::Error;

/// Failure raised by a provider adapter while opening or consuming a stream
///
/// Always carries the original cause; adapters never swallow errors and
/// never retry.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport-level failure (connect, TLS, mid-body read)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider rejected the request outright
    #[error("provider rejected request: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// An inbound stream event could not be decoded into a text fragment
    #[error("malformed stream event: {0}")]
    MalformedEvent(String),

    /// Provider signalled a failure in-band, after the stream was accepted
    #[error("provider fault mid-stream: {0}")]
    Fault(String),

    /// JSON payload failed to parse
    #[error("stream decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Main error type for the orchestration layer
#[derive(Error, Debug)]
pub enum ChatError {
    /// Model id absent from the static descriptor table; raised at
    /// selection time, never inside an in-flight request
    #[error("unknown model: {id}")]
    UnknownModel { id: String },

    /// A provider adapter failed while serving one model's request
    #[error("provider failure for model {model}: {source}")]
    Provider {
        model: String,
        #[source]
        source: ProviderError,
    },

    /// Request phase machine violation; indicates a driver bug
    #[error("invalid request phase transition from {from} via {event}")]
    InvalidTransition { from: String, event: String },
}

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, ChatError>;
