//! Order matching under price/time priority.

pub mod arena;
pub mod engine;
mod tests;

pub use arena::OrderArena;
pub use engine::{BookState, MatchCounters, MatchEngine, MatchOutcome, MatchingStats};
