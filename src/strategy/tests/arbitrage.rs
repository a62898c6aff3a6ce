#[cfg(test)]
mod tests {
    use crate::core::clock::Clock;
    use crate::core::queue::MpscQueue;
    use crate::core::types::{OrderCommand, Side, PRICE_SCALE};
    use crate::engine::OrderLink;
    use crate::strategy::{CrossVenueArbParams, CrossVenueArbStrategy, Strategy};
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;
    use std::time::Duration;

    fn create_link() -> (OrderLink, Arc<MpscQueue<OrderCommand>>) {
        let queue = Arc::new(MpscQueue::with_capacity(256));
        let clock = Arc::new(Clock::with_calibration(1, Duration::from_millis(1)).unwrap());
        let link = OrderLink::new(
            Arc::clone(&queue),
            Arc::new(AtomicU64::new(1)),
            Arc::new(AtomicU64::new(0)),
            clock,
        );
        (link, queue)
    }

    fn drain(queue: &MpscQueue<OrderCommand>) -> Vec<OrderCommand> {
        let mut out = Vec::new();
        while let Some(command) = queue.try_pop() {
            out.push(command);
        }
        out
    }

    #[test]
    fn test_no_orders_without_quotes() {
        let strategy = CrossVenueArbStrategy::new(1, CrossVenueArbParams::default());
        let (link, queue) = create_link();

        strategy.set_venue_a_quotes(100 * PRICE_SCALE, 101 * PRICE_SCALE);
        strategy.process_signals(&link);

        assert!(drain(&queue).is_empty());
    }

    #[test]
    fn test_crosses_when_gap_clears_threshold() {
        let strategy = CrossVenueArbStrategy::new(
            1,
            CrossVenueArbParams {
                min_profit_bps: 10.0,
                max_position: 500,
            },
        );
        let (link, queue) = create_link();

        // Venue A bids 102 while venue B asks 100: 200 bps of edge.
        strategy.set_venue_a_quotes(102 * PRICE_SCALE, 103 * PRICE_SCALE);
        strategy.set_venue_b_quotes(99 * PRICE_SCALE, 100 * PRICE_SCALE);
        strategy.process_signals(&link);

        let commands = drain(&queue);
        assert_eq!(commands.len(), 2);

        let (mut buys, mut sells) = (0, 0);
        for command in commands {
            match command {
                OrderCommand::Submit(order) => {
                    match order.side {
                        Side::Buy => {
                            assert_eq!(order.price, 100 * PRICE_SCALE);
                            buys += 1;
                        }
                        Side::Sell => {
                            assert_eq!(order.price, 102 * PRICE_SCALE);
                            sells += 1;
                        }
                    }
                    assert_eq!(order.quantity, 500);
                }
                other => panic!("expected submit, got {other:?}"),
            }
        }
        assert_eq!((buys, sells), (1, 1));
        assert_eq!(strategy.signal_count(), 1);
    }

    #[test]
    fn test_thin_gap_is_ignored() {
        let strategy = CrossVenueArbStrategy::new(
            1,
            CrossVenueArbParams {
                min_profit_bps: 50.0,
                max_position: 500,
            },
        );
        let (link, queue) = create_link();

        // ~10 bps of edge, threshold is 50.
        strategy.set_venue_a_quotes(100_10_000_000, 100_20_000_000);
        strategy.set_venue_b_quotes(99 * PRICE_SCALE, 100 * PRICE_SCALE);
        strategy.process_signals(&link);

        assert!(drain(&queue).is_empty());
    }

    #[test]
    fn test_position_cap_stops_trading() {
        let strategy = CrossVenueArbStrategy::new(
            1,
            CrossVenueArbParams {
                min_profit_bps: 10.0,
                max_position: 100,
            },
        );
        let (link, queue) = create_link();

        // Fills reported back push the position to the cap.
        strategy.on_trade(&crate::core::types::Trade {
            trade_id: 1,
            buy_order_id: 1,
            sell_order_id: 2,
            symbol_id: 1,
            price: 100 * PRICE_SCALE,
            quantity: 100,
            timestamp: 0,
            aggressor_side: Side::Buy,
        });

        strategy.set_venue_a_quotes(102 * PRICE_SCALE, 103 * PRICE_SCALE);
        strategy.set_venue_b_quotes(99 * PRICE_SCALE, 100 * PRICE_SCALE);
        strategy.process_signals(&link);

        assert_eq!(strategy.position(), 100);
        assert!(drain(&queue).is_empty());
    }
}
