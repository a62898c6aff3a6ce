//! Core value types shared by every pipeline stage

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point price scaled by 1e8 (8 decimal places)
pub type Price = u64;
/// Quantity in minimum tradable units
pub type Quantity = u64;
/// Notional value, in quote units
pub type Value = u64;
/// Unique order identifier
pub type OrderId = u64;
/// Unique trade identifier
pub type TradeId = u64;
/// Symbol identifier
pub type SymbolId = u32;
/// Clock ticks (see [`crate::core::Clock`])
pub type Timestamp = u64;

/// Scale factor for fixed-point prices: 1e8 gives 8 decimal places.
pub const PRICE_SCALE: u64 = 100_000_000;

/// Default capacity for pipeline queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Convert a floating-point price into its fixed-point representation.
pub fn to_scaled_price(price: f64) -> Price {
    (price * PRICE_SCALE as f64) as Price
}

/// Convert a fixed-point price back to a floating-point value.
pub fn from_scaled_price(price: Price) -> f64 {
    price as f64 / PRICE_SCALE as f64
}

/// Notional value of `quantity` units at `price`, in quote units.
pub fn notional(price: Price, quantity: Quantity) -> Value {
    (price as u128 * quantity as u128 / PRICE_SCALE as u128) as Value
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side a matching counterparty rests on.
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
            OrderKind::Stop => write!(f, "STOP"),
            OrderKind::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

/// How long an order stays eligible for matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    Day,
    /// Immediate or cancel: unfilled remainder is dropped, never rests
    Ioc,
    /// Fill or kill: match in full on arrival or not at all
    Fok,
    /// Good till cancel
    Gtc,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Day => write!(f, "DAY"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
            TimeInForce::Gtc => write!(f, "GTC"),
        }
    }
}

/// Lifecycle state of an order.
///
/// Transitions run `Incoming -> PartiallyFilled -> Filled`, or terminate
/// early at `Cancelled` (via cancel) or `Rejected` (risk gate only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Incoming,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Whether this state ends the order's life.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Incoming => write!(f, "INCOMING"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// A client order.
///
/// `quantity` is immutable over the order's life; fills accrue in
/// `filled`, so `open_quantity` is always `quantity - filled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub symbol_id: SymbolId,
    pub side: Side,
    pub kind: OrderKind,
    pub time_in_force: TimeInForce,
    pub price: Price,
    pub quantity: Quantity,
    pub filled: Quantity,
    pub status: OrderStatus,
    pub timestamp: Timestamp,
}

impl Order {
    /// Create a limit order in its initial state.
    pub fn limit(
        order_id: OrderId,
        symbol_id: SymbolId,
        side: Side,
        price: Price,
        quantity: Quantity,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            order_id,
            symbol_id,
            side,
            kind: OrderKind::Limit,
            time_in_force,
            price,
            quantity,
            filled: 0,
            status: OrderStatus::Incoming,
            timestamp: 0,
        }
    }

    /// Create a market order. Buys cross at any price (represented as
    /// `u64::MAX`), sells at any price down to zero.
    pub fn market(order_id: OrderId, symbol_id: SymbolId, side: Side, quantity: Quantity) -> Self {
        let price = match side {
            Side::Buy => Price::MAX,
            Side::Sell => 0,
        };
        Self {
            order_id,
            symbol_id,
            side,
            kind: OrderKind::Market,
            time_in_force: TimeInForce::Ioc,
            price,
            quantity,
            filled: 0,
            status: OrderStatus::Incoming,
            timestamp: 0,
        }
    }

    /// Quantity still open for matching.
    pub fn open_quantity(&self) -> Quantity {
        self.quantity - self.filled
    }

    /// Whether the order has been matched in full.
    pub fn is_filled(&self) -> bool {
        self.filled == self.quantity
    }

    /// Record a fill and advance the status accordingly.
    pub fn apply_fill(&mut self, quantity: Quantity) {
        debug_assert!(quantity <= self.open_quantity());
        self.filled += quantity;
        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}

/// A command travelling the order pipeline: risk gate, then matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    Submit(Order),
    Cancel(OrderId),
}

/// A normalized market-data update for one price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol_id: SymbolId,
    pub price: Price,
    pub quantity: Quantity,
    pub side: Side,
    pub timestamp: Timestamp,
    /// Strictly increasing per symbol
    pub sequence: u64,
}

/// An executed match between two orders.
///
/// `price` is always the resting order's price; the aggressor side is
/// the side of the later-arriving order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub symbol_id: SymbolId,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: Timestamp,
    pub aggressor_side: Side,
}
