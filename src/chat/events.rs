//! Presentation-facing event channel
//!
//! The orchestrator pushes fragment and terminal events onto a bounded
//! channel that the presentation layer consumes asynchronously; no
//! polling. Events of one submit cycle share a request id.

use tokio::sync::mpsc;
use uuid::Uuid;

/// Bounded channel capacity
///
/// Emission awaits free capacity rather than dropping: losing a fragment
/// would break the reassembled reply.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events delivered to the presentation collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// One incremental piece of a model's reply
    Fragment {
        request_id: Uuid,
        model_id: String,
        text: String,
    },

    /// The model's stream exhausted normally; its reply is stored
    Completed { request_id: Uuid, model_id: String },

    /// The model's request failed; its conversation is unchanged apart
    /// from the user turn recorded at submit
    Failed {
        request_id: Uuid,
        model_id: String,
        detail: String,
    },
}

impl ChatEvent {
    /// Model this event belongs to
    pub fn model_id(&self) -> &str {
        match self {
            ChatEvent::Fragment { model_id, .. }
            | ChatEvent::Completed { model_id, .. }
            | ChatEvent::Failed { model_id, .. } => model_id,
        }
    }

    /// Submit cycle this event belongs to
    pub fn request_id(&self) -> Uuid {
        match self {
            ChatEvent::Fragment { request_id, .. }
            | ChatEvent::Completed { request_id, .. }
            | ChatEvent::Failed { request_id, .. } => *request_id,
        }
    }

    /// Whether this is a terminal event for its model's request
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChatEvent::Fragment { .. })
    }
}

/// Event bus for pushing chat events to the presentation layer
pub struct ChatEventBus {
    sender: mpsc::Sender<ChatEvent>,
}

impl ChatEventBus {
    /// Create new event bus with bounded channel
    pub fn new() -> (Self, mpsc::Receiver<ChatEvent>) {
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (ChatEventBus { sender }, receiver)
    }

    /// Emit an event, waiting for channel capacity
    ///
    /// A closed receiver means the presentation side is gone; the event is
    /// discarded silently and the stream task carries on to completion.
    pub async fn emit(&self, event: ChatEvent) {
        let _ = self.sender.send(event).await;
    }

    /// Clone sender for multi-producer usage
    pub fn clone_sender(&self) -> mpsc::Sender<ChatEvent> {
        self.sender.clone()
    }
}

impl Clone for ChatEventBus {
    fn clone(&self) -> Self {
        ChatEventBus {
            sender: self.sender.clone(),
        }
    }
}
