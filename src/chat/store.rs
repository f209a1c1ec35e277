//! Per-model conversation history
//!
//! Pure data structure: one ordered turn sequence per model, created
//! lazily on first append, never shared between models. Mutations are
//! append, remove-from-front (budget enforcement), and clear only;
//! existing turns are never edited in place, so snapshots taken while a
//! stream is in flight for another model stay valid.

use crate::context::HistoryBudgeter;
use crate::types::Turn;
use std::collections::{HashMap, VecDeque};

/// Ordered turn sequences keyed by model id
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    conversations: HashMap<String, VecDeque<Turn>>,
}

impl ConversationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to a model's sequence, creating it on first use
    pub fn append(&mut self, model: &str, turn: Turn) {
        self.conversations
            .entry(model.to_string())
            .or_default()
            .push_back(turn);
    }

    /// Snapshot of a model's sequence, oldest first
    ///
    /// Unknown models yield an empty sequence, not an error.
    pub fn get(&self, model: &str) -> Vec<Turn> {
        self.conversations
            .get(model)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of turns stored for a model
    pub fn len(&self, model: &str) -> usize {
        self.conversations.get(model).map_or(0, |turns| turns.len())
    }

    /// Whether a model has no stored turns
    pub fn is_empty(&self, model: &str) -> bool {
        self.len(model) == 0
    }

    /// Drop a model's entire sequence
    pub fn clear(&mut self, model: &str) {
        self.conversations.remove(model);
    }

    /// Drop every model's sequence
    pub fn clear_all(&mut self) {
        self.conversations.clear();
    }

    /// Trim a model's sequence to fit the limit, oldest turns first
    ///
    /// Returns the number of turns dropped. Unknown models are a no-op.
    pub fn enforce_budget(
        &mut self,
        model: &str,
        budgeter: &HistoryBudgeter,
        token_limit: u32,
    ) -> usize {
        match self.conversations.get_mut(model) {
            Some(turns) => budgeter.enforce(turns, token_limit),
            None => 0,
        }
    }

    /// Current token cost of a model's sequence under the shared scheme
    pub fn cost(&self, model: &str, budgeter: &HistoryBudgeter) -> usize {
        match self.conversations.get(model) {
            Some(turns) => budgeter.cost(turns),
            None => budgeter.cost(&VecDeque::new()),
        }
    }
}
