//! polychat - multi-provider streaming chat orchestration
//!
//! Converse with several model backends concurrently, each reachable
//! through a different wire protocol, while keeping a bounded,
//! token-budgeted conversation history per model.
//!
//! # Architecture
//!
//! - **types**: turns, fragments, and the static model catalog
//! - **context**: token counting and oldest-first history budgeting
//! - **streaming**: provider adapters normalizing heterogeneous wire
//!   protocols into one fragment stream shape
//! - **chat**: the conversation store and the orchestrator driving one
//!   concurrent request task per active model
//!
//! The presentation layer, credential loading, and process bootstrap are
//! external collaborators: they supply user input, settings, and the
//! token limit, and consume the orchestrator's event channel.

pub mod chat;
pub mod config;
pub mod context;
pub mod errors;
pub mod streaming;
pub mod types;

// Re-export commonly used types
pub use chat::{ChatEvent, ChatEventBus, ChatOrchestrator, ConversationStore};
pub use config::{CompletionSettings, EventStreamSettings, DEFAULT_TOKEN_LIMIT};
pub use context::{HistoryBudgeter, TokenCounter};
pub use errors::{ChatError, ProviderError, Result};
pub use streaming::{CompletionAdapter, EventStreamAdapter, FragmentStream, ProviderAdapter};
pub use types::{ModelCatalog, ModelDescriptor, ProviderKind, Role, StreamFragment, Turn};
