//! Engine configuration.

use super::error::EngineError;
use crate::core::types::{Price, SymbolId, PRICE_SCALE};
use crate::risk::RiskLimits;
use serde::{Deserialize, Serialize};

/// Capacities and toggles for the whole pipeline. Validated before the
/// engine starts; a bad value refuses startup rather than degrading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Client order ingress queue (MPSC), power of two
    pub ingress_capacity: usize,
    /// Risk-approved order queue (SPSC), power of two
    pub approved_capacity: usize,
    /// Trade fan-out queue (MPSC), power of two
    pub trade_capacity: usize,
    /// Per-symbol tick queue (SPSC), power of two
    pub tick_queue_capacity: usize,
    /// Displayed depth cap per book side
    pub book_depth: usize,
    /// Resting-order slots in the matcher's arena
    pub arena_capacity: usize,
    pub risk: RiskLimits,
    /// Symbols subscribed at startup
    pub symbols: Vec<SymbolId>,
    /// Drive the gateway from the built-in synthetic feed
    pub synthetic_feed: bool,
    pub feed_base_price: Price,
    pub feed_interval_us: u64,
    /// Clock calibration: sample count and per-sample window
    pub clock_calibration_samples: u32,
    pub clock_calibration_window_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ingress_capacity: 4096,
            approved_capacity: 1024,
            trade_capacity: 2048,
            tick_queue_capacity: 4096,
            book_depth: 1000,
            arena_capacity: 10_000,
            risk: RiskLimits::default(),
            symbols: Vec::new(),
            synthetic_feed: false,
            feed_base_price: 100 * PRICE_SCALE,
            feed_interval_us: 100,
            clock_calibration_samples: 3,
            clock_calibration_window_ms: 2,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let queues = [
            ("ingress_capacity", self.ingress_capacity),
            ("approved_capacity", self.approved_capacity),
            ("trade_capacity", self.trade_capacity),
            ("tick_queue_capacity", self.tick_queue_capacity),
        ];
        for (name, capacity) in queues {
            if capacity < 2 || !capacity.is_power_of_two() {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be a power of two >= 2, got {capacity}"
                )));
            }
        }

        if self.arena_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "arena_capacity must be non-zero".into(),
            ));
        }
        if self.book_depth == 0 {
            return Err(EngineError::InvalidConfig(
                "book_depth must be non-zero".into(),
            ));
        }
        if self.clock_calibration_samples == 0 {
            return Err(EngineError::InvalidConfig(
                "clock_calibration_samples must be non-zero".into(),
            ));
        }

        Ok(())
    }
}
