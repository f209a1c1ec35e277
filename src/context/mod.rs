//! Token accounting and history budgeting

pub mod budgeter;
pub mod counter;

pub use budgeter::HistoryBudgeter;
pub use counter::{TokenCounter, REQUEST_OVERHEAD_TOKENS, TURN_OVERHEAD_TOKENS};
