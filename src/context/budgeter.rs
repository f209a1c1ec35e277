//! History truncation against a per-request token ceiling
//!
//! Runs before every provider request, with the limit supplied for that
//! request. The same value is later reused as the provider's
//! max-output-token parameter: output budget and history budget share one
//! configured number.

use crate::context::counter::TokenCounter;
use crate::types::Turn;
use std::collections::VecDeque;

/// Enforces a token ceiling by dropping oldest turns first
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryBudgeter {
    counter: TokenCounter,
}

impl HistoryBudgeter {
    /// Create a budgeter over the shared counting scheme
    pub fn new(counter: TokenCounter) -> Self {
        Self { counter }
    }

    /// Trim the sequence until its request cost fits the limit
    ///
    /// Removes from the oldest end only; never edits a turn's content. A
    /// single turn whose cost alone exceeds the limit is still removed
    /// whole, so the sequence may drain to empty rather than raise.
    /// Returns the number of turns dropped.
    pub fn enforce(&self, turns: &mut VecDeque<Turn>, token_limit: u32) -> usize {
        let mut dropped = 0;

        while self.counter.request_cost(turns.iter()) > token_limit as usize {
            if turns.pop_front().is_none() {
                break;
            }
            dropped += 1;
        }

        if dropped > 0 {
            tracing::debug!(
                dropped,
                remaining = turns.len(),
                token_limit,
                "evicted oldest turns to fit budget"
            );
        }

        dropped
    }

    /// Current request cost of a sequence under the shared scheme
    pub fn cost(&self, turns: &VecDeque<Turn>) -> usize {
        self.counter.request_cost(turns.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::counter::{REQUEST_OVERHEAD_TOKENS, TURN_OVERHEAD_TOKENS};
    use quickcheck_macros::quickcheck;

    fn turns_of(contents: &[&str]) -> VecDeque<Turn> {
        contents.iter().map(|c| Turn::user(*c)).collect()
    }

    #[test]
    fn test_no_trim_when_under_limit() {
        let budgeter = HistoryBudgeter::default();
        let mut turns = turns_of(&["hello", "world"]);

        let dropped = budgeter.enforce(&mut turns, 4096);

        assert_eq!(dropped, 0);
        assert_eq!(turns.len(), 2);
    }

    #[test]
    fn test_drops_oldest_first() {
        let budgeter = HistoryBudgeter::default();
        // Each turn: 4 overhead + 10 content = 14 tokens; request base 2.
        // Three turns cost 44; limit 40 forces exactly one eviction.
        let a = "a".repeat(40);
        let b = "b".repeat(40);
        let c = "c".repeat(40);
        let mut turns = turns_of(&[&a, &b, &c]);

        let dropped = budgeter.enforce(&mut turns, 40);

        assert_eq!(dropped, 1);
        assert_eq!(turns.len(), 2);
        assert!(turns[0].content.starts_with('b'));
        assert!(turns[1].content.starts_with('c'));
    }

    #[test]
    fn test_oversized_single_turn_drains_to_empty() {
        let budgeter = HistoryBudgeter::default();
        let huge = "x".repeat(1000); // 250 content tokens
        let mut turns = turns_of(&[&huge]);

        let dropped = budgeter.enforce(&mut turns, 50);

        // The turn is removed whole, never truncated within its content
        assert_eq!(dropped, 1);
        assert!(turns.is_empty());
    }

    #[test]
    fn test_empty_sequence_is_stable() {
        let budgeter = HistoryBudgeter::default();
        let mut turns: VecDeque<Turn> = VecDeque::new();

        // Limit below the flat request overhead must not loop forever
        let dropped = budgeter.enforce(&mut turns, 1);

        assert_eq!(dropped, 0);
        assert!(turns.is_empty());
    }

    #[test]
    fn test_cost_matches_counter_scheme() {
        let budgeter = HistoryBudgeter::default();
        let turns = turns_of(&["abcd"]); // 1 content token

        assert_eq!(
            budgeter.cost(&turns),
            REQUEST_OVERHEAD_TOKENS + TURN_OVERHEAD_TOKENS + 1
        );
    }

    #[quickcheck]
    fn prop_post_enforce_cost_fits_or_empty(contents: Vec<String>, limit: u32) -> bool {
        let limit = limit % 2000;
        let budgeter = HistoryBudgeter::default();
        let mut turns: VecDeque<Turn> = contents.into_iter().map(Turn::user).collect();

        budgeter.enforce(&mut turns, limit);

        turns.is_empty() || budgeter.cost(&turns) <= limit as usize
    }

    #[quickcheck]
    fn prop_newest_survives_longest(contents: Vec<String>, limit: u32) -> bool {
        let limit = limit % 2000;
        let budgeter = HistoryBudgeter::default();
        let original: Vec<Turn> = contents.into_iter().map(Turn::user).collect();
        let mut turns: VecDeque<Turn> = original.iter().cloned().collect();

        budgeter.enforce(&mut turns, limit);

        // Whatever remains is exactly a suffix of the original sequence
        let kept = turns.len();
        original[original.len() - kept..]
            .iter()
            .zip(turns.iter())
            .all(|(a, b)| a == b)
    }
}
