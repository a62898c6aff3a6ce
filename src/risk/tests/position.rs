#[cfg(test)]
mod tests {
    use crate::core::types::{Side, Trade, PRICE_SCALE};
    use crate::risk::PositionTracker;

    fn create_trade(price_units: u64, quantity: u64, aggressor: Side) -> Trade {
        Trade {
            trade_id: 1,
            buy_order_id: 1,
            sell_order_id: 2,
            symbol_id: 1,
            price: price_units * PRICE_SCALE,
            quantity,
            timestamp: 0,
            aggressor_side: aggressor,
        }
    }

    #[test]
    fn test_buy_opens_long_position() {
        let mut tracker = PositionTracker::default();

        tracker.apply_trade(&create_trade(100, 50, Side::Buy));

        assert_eq!(tracker.position, 50);
        assert_eq!(tracker.vwap, 100 * PRICE_SCALE);
        assert_eq!(tracker.volume, 50);
        assert_eq!(tracker.notional, 5_000);
        assert_eq!(tracker.realized_pnl, 0);
    }

    #[test]
    fn test_vwap_weighted_over_fills() {
        let mut tracker = PositionTracker::default();

        tracker.apply_trade(&create_trade(100, 100, Side::Buy));
        tracker.apply_trade(&create_trade(110, 100, Side::Buy));

        assert_eq!(tracker.position, 200);
        assert_eq!(tracker.vwap, 105 * PRICE_SCALE);
        assert_eq!(tracker.notional, 10_000 + 11_000);
    }

    #[test]
    fn test_reducing_long_realizes_pnl() {
        let mut tracker = PositionTracker::default();

        tracker.apply_trade(&create_trade(100, 100, Side::Buy));
        tracker.apply_trade(&create_trade(110, 50, Side::Sell));

        assert_eq!(tracker.position, 50);
        // (110 - 100) * 50 closed units.
        assert_eq!(tracker.realized_pnl, 500);
        // Notional shrinks by the closed half.
        assert_eq!(tracker.notional, 5_000);
    }

    #[test]
    fn test_reducing_short_realizes_pnl() {
        let mut tracker = PositionTracker::default();

        tracker.apply_trade(&create_trade(100, 80, Side::Sell));
        assert_eq!(tracker.position, -80);

        tracker.apply_trade(&create_trade(90, 40, Side::Buy));
        assert_eq!(tracker.position, -40);
        // Short entered at 100, bought back at 90: +10 per unit.
        assert_eq!(tracker.realized_pnl, 400);
    }

    #[test]
    fn test_losing_reduction_goes_negative() {
        let mut tracker = PositionTracker::default();

        tracker.apply_trade(&create_trade(100, 100, Side::Buy));
        tracker.apply_trade(&create_trade(90, 100, Side::Sell));

        assert_eq!(tracker.position, 0);
        assert_eq!(tracker.realized_pnl, -1_000);
        assert_eq!(tracker.notional, 0);
    }

    #[test]
    fn test_fill_crossing_zero_opens_other_side() {
        let mut tracker = PositionTracker::default();

        tracker.apply_trade(&create_trade(100, 50, Side::Buy));
        tracker.apply_trade(&create_trade(120, 80, Side::Sell));

        assert_eq!(tracker.position, -30);
        // Only the 50 closed units realize PnL.
        assert_eq!(tracker.realized_pnl, 1_000);
        // Old exposure fully closed, 30 units reopened at 120.
        assert_eq!(tracker.notional, 3_600);
    }

    #[test]
    fn test_notional_reduction_is_monotone() {
        let mut tracker = PositionTracker::default();

        tracker.apply_trade(&create_trade(100, 1_000, Side::Buy));
        let mut last = tracker.notional;

        for _ in 0..10 {
            tracker.apply_trade(&create_trade(101, 77, Side::Sell));
            assert!(tracker.notional <= last, "notional must not grow on reduction");
            last = tracker.notional;
        }
    }
}
