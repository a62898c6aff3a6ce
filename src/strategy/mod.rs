//! Strategy harness: the event-consumer contract plus the built-in
//! mean-reversion and cross-venue strategies.

pub mod arbitrage;
pub mod mean_reversion;
mod tests;

pub use arbitrage::{CrossVenueArbParams, CrossVenueArbStrategy};
pub use mean_reversion::{MeanReversionParams, MeanReversionStrategy};

use crate::book::BookSnapshot;
use crate::core::types::{SymbolId, Tick, Trade};
use crate::engine::OrderLink;

/// A strategy plugged into the pipeline.
///
/// Event handlers are invoked from pipeline threads and should only
/// enqueue into the strategy's internal buffers; the real work happens
/// in [`process_signals`](Strategy::process_signals), which the strategy
/// worker calls in a loop with the order-submission capability.
pub trait Strategy: Send + Sync {
    /// The symbol this strategy trades.
    fn symbol_id(&self) -> SymbolId;

    /// Disabled strategies receive no events and are never polled.
    fn is_enabled(&self) -> bool {
        true
    }

    /// A tick was applied to this symbol's book.
    fn on_market_data(&self, tick: &Tick);

    /// A trade on this symbol was fanned out.
    fn on_trade(&self, trade: &Trade);

    /// A fresh book snapshot for this symbol.
    fn on_book_snapshot(&self, snapshot: &BookSnapshot);

    /// Drain buffered events and emit orders through `link`.
    fn process_signals(&self, link: &OrderLink);

    /// Called once during engine shutdown.
    fn shutdown(&self) {}
}
