//! Provider adapters and wire-format decoding
//!
//! Each adapter knows how to build one provider's request and normalize its
//! streaming wire format into an ordered, finite sequence of text
//! fragments. Fragments are delivered in wire arrival order, never
//! reordered or batched, and adapters perform no retries.

pub mod completion;
pub mod event_stream;
pub mod frame;
pub mod sigv4;
pub mod sse;

pub use completion::CompletionAdapter;
pub use event_stream::EventStreamAdapter;

use crate::errors::ProviderError;
use crate::types::{ModelDescriptor, StreamFragment, Turn};
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

/// Lazy, finite, non-restartable sequence of reply fragments
///
/// Consuming it either exhausts normally or fails with a `ProviderError`;
/// fragments yielded before a failure remain valid and are not retracted.
pub type FragmentStream =
    Pin<Box<dyn Stream<Item = std::result::Result<StreamFragment, ProviderError>> + Send>>;

/// Protocol-specific translator between the uniform request model and one
/// provider's wire format
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Issue a streaming request for one model
    ///
    /// Returning `Ok` means the transport accepted the request and a live
    /// fragment sequence exists; failures after that point surface as
    /// `Err` items inside the stream.
    async fn stream(
        &self,
        model: &ModelDescriptor,
        system_prompt: Option<&str>,
        history: &[Turn],
        token_limit: u32,
    ) -> std::result::Result<FragmentStream, ProviderError>;
}
