//! Pre-trade risk limits and check verdicts.

use crate::core::types::{to_scaled_price, Price, Quantity, Value, PRICE_SCALE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard limits applied to every inbound order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum absolute position per symbol, in quantity units
    pub max_position: Quantity,
    /// Maximum open notional per symbol, in quote units
    pub max_notional: Value,
    /// Global order admission rate, tokens per second
    pub max_orders_per_second: u32,
    /// Global admission burst (token bucket size)
    pub order_burst: u32,
    /// Daily realized-loss floor, in quote units
    pub max_loss_per_day: Value,
    /// Largest single order quantity
    pub max_order_size: Quantity,
    /// Maximum distance from the reference price, scaled by 1e8
    pub max_price_deviation: Price,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position: 1_000_000,
            max_notional: 10_000_000 * PRICE_SCALE,
            max_orders_per_second: 1_000,
            order_burst: 1_000,
            max_loss_per_day: 100_000 * PRICE_SCALE,
            max_order_size: 100_000,
            max_price_deviation: to_scaled_price(10.0),
        }
    }
}

/// Outcome of the pre-trade check, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskVerdict {
    Approved,
    RejectedRateLimit,
    RejectedOrderSize,
    RejectedPriceLimit,
    RejectedPositionLimit,
    RejectedNotionalLimit,
    RejectedLossLimit,
}

impl RiskVerdict {
    pub fn is_approved(self) -> bool {
        matches!(self, RiskVerdict::Approved)
    }
}

impl fmt::Display for RiskVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskVerdict::Approved => write!(f, "approved"),
            RiskVerdict::RejectedRateLimit => write!(f, "rejected: rate limit"),
            RiskVerdict::RejectedOrderSize => write!(f, "rejected: order size"),
            RiskVerdict::RejectedPriceLimit => write!(f, "rejected: price deviation"),
            RiskVerdict::RejectedPositionLimit => write!(f, "rejected: position limit"),
            RiskVerdict::RejectedNotionalLimit => write!(f, "rejected: notional limit"),
            RiskVerdict::RejectedLossLimit => write!(f, "rejected: loss limit"),
        }
    }
}
