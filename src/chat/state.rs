//! Per-request phase machine, one instance per model per submit
//!
//! Deterministic finite state machine:
//! - Safety: no invalid phase reachable
//! - Liveness: every accepted request ends in Completed or Failed
//! - Determinism: unique next phase per event
//!
//! Completed and Failed are terminal for the request; the model returns
//! to an implicit Idle for the next submit.

use crate::errors::{ChatError, Result};
use std::fmt;

/// Phases of one model's request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestPhase {
    /// No request in flight
    Idle,

    /// Request handed to the adapter, stream not yet live
    Sending,

    /// Live fragment sequence being consumed
    Streaming,

    /// Stream exhausted normally; assistant turn stored (terminal)
    Completed,

    /// Adapter raised a provider error; nothing stored (terminal)
    Failed,
}

/// Events that move a request between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Model was in the active set when the user submitted
    Submit,

    /// Transport accepted the request; fragment sequence is live
    StreamOpened,

    /// Fragment sequence exhausted normally
    StreamExhausted,

    /// Adapter raised a provider error, before or during streaming
    StreamError,
}

impl RequestPhase {
    /// Check if this is a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestPhase::Completed | RequestPhase::Failed)
    }

    /// Attempt a phase transition
    ///
    /// Valid transitions:
    /// 1. Idle      → Sending    (on: Submit)
    /// 2. Sending   → Streaming  (on: StreamOpened)
    /// 3. Sending   → Failed     (on: StreamError)
    /// 4. Streaming → Completed  (on: StreamExhausted)
    /// 5. Streaming → Failed     (on: StreamError)
    pub fn transition(self, event: PhaseEvent) -> Result<RequestPhase> {
        use PhaseEvent::*;
        use RequestPhase::*;

        let next = match (self, event) {
            (Idle, Submit) => Sending,
            (Sending, StreamOpened) => Streaming,
            (Sending, StreamError) => Failed,
            (Streaming, StreamExhausted) => Completed,
            (Streaming, StreamError) => Failed,
            (from, event) => {
                return Err(ChatError::InvalidTransition {
                    from: from.to_string(),
                    event: format!("{:?}", event),
                })
            }
        };

        Ok(next)
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestPhase::Idle => "Idle",
            RequestPhase::Sending => "Sending",
            RequestPhase::Streaming => "Streaming",
            RequestPhase::Completed => "Completed",
            RequestPhase::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}
