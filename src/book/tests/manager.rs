#[cfg(test)]
mod tests {
    use crate::book::BookManager;
    use crate::core::types::{Side, Tick};

    fn create_tick(symbol_id: u32, price: u64, quantity: u64, side: Side) -> Tick {
        Tick {
            symbol_id,
            price,
            quantity,
            side,
            timestamp: 0,
            sequence: 0,
        }
    }

    #[test]
    fn test_lazy_creation() {
        let manager = BookManager::new(100);

        assert!(manager.get(1).is_none());
        assert_eq!(manager.book_count(), 0);

        let book = manager.get_or_create(1);
        assert_eq!(book.symbol_id(), 1);
        assert_eq!(manager.book_count(), 1);
        assert!(manager.get(1).is_some());
    }

    #[test]
    fn test_apply_tick_routes_to_book() {
        let manager = BookManager::new(100);

        manager.apply_tick(&create_tick(7, 10_000, 50, Side::Buy));
        manager.apply_tick(&create_tick(7, 10_100, 25, Side::Sell));
        manager.apply_tick(&create_tick(9, 20_000, 10, Side::Buy));

        let book7 = manager.get(7).unwrap();
        assert_eq!(book7.best_bid(), Some(10_000));
        assert_eq!(book7.best_ask(), Some(10_100));

        let book9 = manager.get(9).unwrap();
        assert_eq!(book9.best_bid(), Some(20_000));

        let mut symbols = manager.active_symbols();
        symbols.sort_unstable();
        assert_eq!(symbols, vec![7, 9]);
    }

    #[test]
    fn test_shared_book_instances() {
        let manager = BookManager::new(100);

        let a = manager.get_or_create(1);
        let b = manager.get_or_create(1);
        a.update_level(Side::Buy, 10_000, 1);

        // Both handles see the same book.
        assert_eq!(b.best_bid(), Some(10_000));
    }
}
