//! Conversation state and request orchestration

pub mod events;
pub mod orchestrator;
pub mod state;
pub mod store;

pub use events::{ChatEvent, ChatEventBus};
pub use orchestrator::ChatOrchestrator;
pub use state::{PhaseEvent, RequestPhase};
pub use store::ConversationStore;
