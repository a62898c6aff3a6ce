//! Engine-wide statistics.

use crate::market_data::GatewayStats;
use crate::matching::MatchingStats;
use serde::{Deserialize, Serialize};

/// Aggregated view over every pipeline stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngineStats {
    pub orders_received: u64,
    pub orders_processed: u64,
    pub orders_rejected: u64,
    pub trades_executed: u64,
    /// Orders through the matcher per second of uptime
    pub order_processing_rate: f64,
    pub uptime_seconds: f64,
    pub market_data: GatewayStats,
    pub matching: MatchingStats,
}
