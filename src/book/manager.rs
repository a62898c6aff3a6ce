//! Registry of depth books across subscribed symbols.

use super::book::DepthBook;
use crate::core::types::{SymbolId, Tick};
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent symbol-to-book map.
///
/// Books are created lazily on first use and shared as `Arc`s so the
/// aggregation workers, strategies and stats readers can all hold one.
pub struct BookManager {
    books: DashMap<SymbolId, Arc<DepthBook>>,
    max_levels: usize,
}

impl BookManager {
    pub fn new(max_levels: usize) -> Self {
        Self {
            books: DashMap::new(),
            max_levels,
        }
    }

    pub fn get(&self, symbol_id: SymbolId) -> Option<Arc<DepthBook>> {
        self.books.get(&symbol_id).map(|entry| Arc::clone(&entry))
    }

    pub fn get_or_create(&self, symbol_id: SymbolId) -> Arc<DepthBook> {
        Arc::clone(
            &self
                .books
                .entry(symbol_id)
                .or_insert_with(|| Arc::new(DepthBook::new(symbol_id, self.max_levels))),
        )
    }

    /// Route a tick into its symbol's book.
    pub fn apply_tick(&self, tick: &Tick) {
        self.get_or_create(tick.symbol_id)
            .update_level(tick.side, tick.price, tick.quantity);
    }

    pub fn active_symbols(&self) -> Vec<SymbolId> {
        self.books.iter().map(|entry| *entry.key()).collect()
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }
}
