//! # In-Process Trading Engine
//!
//! A low-latency electronic trading pipeline written in Rust: market-data
//! ticks feed per-symbol L2 books, client orders pass a pre-trade risk
//! gate, and a price/time-priority matching engine turns them into trades
//! that flow back through the loop.
//!
//! ## Key Features
//!
//! - **Staged pipeline**: ingress, risk, matching and trade fan-out run as
//!   dedicated worker threads connected by typed lock-free queues. Each
//!   item is owned by exactly one stage at a time; backpressure is a
//!   return value, never a blocked thread.
//!
//! - **Matching engine**: price/time priority with aggressive-order
//!   sweeps, partial fills and O(1) cancel-by-id, built on a slot arena
//!   instead of pointer-linked nodes.
//!
//! - **Book aggregation**: per-symbol depth ladders maintained from the
//!   tick stream, with a lock-free read path for best bid/ask and
//!   versioned snapshots.
//!
//! - **Risk gate**: token-bucket rate limiting plus position, notional,
//!   loss, order-size and price-deviation checks, with position/PnL
//!   bookkeeping driven by executed trades.
//!
//! - **Concurrency substrate**: SPSC/MPSC/MPMC and priority queues, a
//!   lock-free object pool and a sliding history window, all bounded and
//!   allocation-free on the hot path.
//!
//! ## Design Goals
//!
//! 1. **Correctness**: conservation of quantity, FIFO within price level
//!    and monotone trade ids hold under every interleaving.
//! 2. **Determinism**: the matcher is single-threaded and is the
//!    serialization point for all order outcomes.
//! 3. **Graceful degradation**: full queues and exhausted pools reject
//!    work with typed errors instead of aborting or blocking.
//!
//! ## Status
//!
//! This engine is a self-contained core: wire transport, persistence and
//! client authentication are left to the embedding application.

pub mod book;
pub mod core;
pub mod engine;
pub mod market_data;
pub mod matching;
pub mod risk;
pub mod strategy;

pub use crate::book::{BookManager, BookSnapshot, DepthBook, DepthLevel};
pub use crate::core::clock::{Clock, ClockError};
pub use crate::core::queue::{MpmcQueue, MpscQueue, PriorityQueue, PushError, SpscQueue};
pub use crate::core::types::{
    Order, OrderCommand, OrderId, OrderKind, OrderStatus, Price, Quantity, Side, SymbolId, Tick,
    TimeInForce, Trade, TradeId, PRICE_SCALE,
};
pub use crate::engine::{
    ChannelSink, EngineConfig, EngineError, EngineEvent, EngineStats, EventSink, OrderLink,
    TradingEngine,
};
pub use crate::matching::{BookState, MatchEngine, MatchOutcome, MatchingStats};
pub use crate::risk::{PositionInfo, RiskLimits, RiskManager, RiskVerdict};
pub use crate::strategy::{CrossVenueArbStrategy, MeanReversionStrategy, Strategy};
