//! Cross-venue arbitrage: trade the gap between two quote sources.

use super::Strategy;
use crate::book::BookSnapshot;
use crate::core::queue::SpscQueue;
use crate::core::types::{
    from_scaled_price, Price, Quantity, Side, SymbolId, Tick, TimeInForce, Trade,
};
use crate::engine::OrderLink;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use tracing::trace;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CrossVenueArbParams {
    /// Gap worth crossing, in basis points
    pub min_profit_bps: f64,
    pub max_position: Quantity,
}

impl Default for CrossVenueArbParams {
    fn default() -> Self {
        Self {
            min_profit_bps: 10.0,
            max_position: 500,
        }
    }
}

#[derive(Default)]
struct VenueQuote {
    bid: AtomicU64,
    ask: AtomicU64,
}

impl VenueQuote {
    fn set(&self, bid: Price, ask: Price) {
        self.bid.store(bid, Ordering::Relaxed);
        self.ask.store(ask, Ordering::Relaxed);
    }

    fn get(&self) -> (Price, Price) {
        (
            self.bid.load(Ordering::Relaxed),
            self.ask.load(Ordering::Relaxed),
        )
    }
}

/// Watches two venues' quotes and fires paired orders when one venue's
/// bid clears the other's ask by the profit threshold.
pub struct CrossVenueArbStrategy {
    symbol_id: SymbolId,
    params: CrossVenueArbParams,
    venue_a: VenueQuote,
    venue_b: VenueQuote,
    trades: SpscQueue<Trade>,
    position: AtomicI64,
    enabled: AtomicBool,
    signal_count: AtomicU64,
}

impl CrossVenueArbStrategy {
    pub fn new(symbol_id: SymbolId, params: CrossVenueArbParams) -> Self {
        Self {
            symbol_id,
            params,
            venue_a: VenueQuote::default(),
            venue_b: VenueQuote::default(),
            trades: SpscQueue::with_capacity(256),
            position: AtomicI64::new(0),
            enabled: AtomicBool::new(true),
            signal_count: AtomicU64::new(0),
        }
    }

    /// Quote update from the first venue.
    pub fn set_venue_a_quotes(&self, bid: Price, ask: Price) {
        self.venue_a.set(bid, ask);
    }

    /// Quote update from the second venue.
    pub fn set_venue_b_quotes(&self, bid: Price, ask: Price) {
        self.venue_b.set(bid, ask);
    }

    pub fn position(&self) -> i64 {
        self.position.load(Ordering::Relaxed)
    }

    pub fn signal_count(&self) -> u64 {
        self.signal_count.load(Ordering::Relaxed)
    }

    fn profit_bps(sell_at: Price, buy_at: Price) -> f64 {
        let buy = from_scaled_price(buy_at);
        if buy <= 0.0 {
            return 0.0;
        }
        (from_scaled_price(sell_at) - buy) / buy * 10_000.0
    }

    /// The pair to cross, if the gap clears the threshold: (buy price, sell price).
    fn opportunity(&self) -> Option<(Price, Price)> {
        let (a_bid, a_ask) = self.venue_a.get();
        let (b_bid, b_ask) = self.venue_b.get();

        if a_bid == 0 || a_ask == 0 || b_bid == 0 || b_ask == 0 {
            return None;
        }

        if a_bid > b_ask && Self::profit_bps(a_bid, b_ask) >= self.params.min_profit_bps {
            return Some((b_ask, a_bid));
        }
        if b_bid > a_ask && Self::profit_bps(b_bid, a_ask) >= self.params.min_profit_bps {
            return Some((a_ask, b_bid));
        }

        None
    }
}

impl Strategy for CrossVenueArbStrategy {
    fn symbol_id(&self) -> SymbolId {
        self.symbol_id
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn on_market_data(&self, tick: &Tick) {
        // Venue A mirrors the engine's own feed; venue B quotes arrive
        // through the setters.
        if tick.symbol_id == self.symbol_id {
            match tick.side {
                Side::Buy => self.venue_a.bid.store(tick.price, Ordering::Relaxed),
                Side::Sell => self.venue_a.ask.store(tick.price, Ordering::Relaxed),
            }
        }
    }

    fn on_trade(&self, trade: &Trade) {
        let _ = self.trades.try_push(*trade);
    }

    fn on_book_snapshot(&self, snapshot: &BookSnapshot) {
        if let (Some(bid), Some(ask)) = (snapshot.best_bid, snapshot.best_ask) {
            self.venue_a.set(bid, ask);
        }
    }

    fn process_signals(&self, link: &OrderLink) {
        while let Some(trade) = self.trades.try_pop() {
            if trade.symbol_id == self.symbol_id {
                let delta = match trade.aggressor_side {
                    Side::Buy => trade.quantity as i64,
                    Side::Sell => -(trade.quantity as i64),
                };
                self.position.fetch_add(delta, Ordering::Relaxed);
            }
        }

        let Some((buy_at, sell_at)) = self.opportunity() else {
            return;
        };

        let headroom = self
            .params
            .max_position
            .saturating_sub(self.position().unsigned_abs());
        if headroom == 0 {
            return;
        }
        let size: Quantity = headroom;

        let bought = link.submit_limit(self.symbol_id, Side::Buy, buy_at, size, TimeInForce::Ioc);
        let sold = link.submit_limit(self.symbol_id, Side::Sell, sell_at, size, TimeInForce::Ioc);

        if bought.is_some() || sold.is_some() {
            self.signal_count.fetch_add(1, Ordering::Relaxed);
            trace!(
                symbol_id = self.symbol_id,
                buy_at,
                sell_at,
                size,
                "cross-venue pair"
            );
        }
    }
}
