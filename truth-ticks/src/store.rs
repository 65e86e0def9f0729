//! Bounded per-symbol ring buffers of recent trade prints.
//!
//! The store is the only shared mutable state of the engine. Each symbol owns its own buffer
//! behind its own lock, so a feed writing one symbol never blocks a scoring pass reading another.
//! The outer map is only write-locked the first time a symbol is seen.

use crate::print::{RawPrint, TradePrint};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use smol_str::SmolStr;
use std::{collections::VecDeque, sync::Arc};
use tracing::trace;

/// Default number of prints retained per symbol.
pub const DEFAULT_TICK_STORE_CAPACITY: usize = 200;

type SymbolBuffer = Arc<RwLock<VecDeque<TradePrint>>>;

/// Thread-safe, symbol-keyed store of the most recent trade prints.
#[derive(Debug)]
pub struct TickStore {
    capacity: usize,
    symbols: RwLock<FnvHashMap<SmolStr, SymbolBuffer>>,
}

impl Default for TickStore {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_STORE_CAPACITY)
    }
}

impl TickStore {
    /// Create a store retaining up to `capacity` prints per symbol (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            symbols: RwLock::new(FnvHashMap::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a print to the symbol's buffer, evicting the oldest print beyond capacity.
    ///
    /// Malformed prints (non-positive price or size, missing timestamp) are dropped silently since
    /// noisy feeds are expected. Returns whether the print was accepted.
    pub fn add_print(&self, symbol: &str, print: impl Into<RawPrint>) -> bool {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            trace!("dropping print with blank symbol");
            return false;
        }

        let Some(print) = TradePrint::from_raw(print.into()) else {
            trace!(%symbol, "dropping malformed print");
            return false;
        };

        let buffer = self.buffer_or_insert(symbol);
        let mut buffer = buffer.write();
        while buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(print);
        true
    }

    /// Copy of the symbol's prints in arrival order; empty if the symbol is unknown.
    pub fn snapshot(&self, symbol: &str) -> Vec<TradePrint> {
        self.buffer(symbol)
            .map(|buffer| buffer.read().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of prints currently held for `symbol`.
    pub fn len(&self, symbol: &str) -> usize {
        self.buffer(symbol)
            .map(|buffer| buffer.read().len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self, symbol: &str) -> bool {
        self.len(symbol) == 0
    }

    /// All symbols seen so far, sorted.
    pub fn symbols(&self) -> Vec<SmolStr> {
        let mut symbols: Vec<SmolStr> = self.symbols.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Drop every print held for `symbol`. The symbol itself stays known.
    pub fn clear(&self, symbol: &str) {
        if let Some(buffer) = self.buffer(symbol) {
            buffer.write().clear();
        }
    }

    fn buffer(&self, symbol: &str) -> Option<SymbolBuffer> {
        self.symbols.read().get(symbol.trim()).cloned()
    }

    fn buffer_or_insert(&self, symbol: &str) -> SymbolBuffer {
        if let Some(buffer) = self.buffer(symbol) {
            return buffer;
        }

        // Another writer may have created the buffer between the read and write lock
        self.symbols
            .write()
            .entry(SmolStr::new(symbol))
            .or_insert_with(|| Arc::new(RwLock::new(VecDeque::with_capacity(self.capacity))))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn print(timestamp: i64, price: f64) -> TradePrint {
        TradePrint::new(timestamp, price, 100.0, Some("NYSE"))
    }

    #[test]
    fn test_snapshot_unknown_symbol_is_empty() {
        let store = TickStore::default();
        assert!(store.snapshot("PFF-A").is_empty());
        assert!(store.is_empty("PFF-A"));
    }

    #[test]
    fn test_add_print_rejects_malformed() {
        let store = TickStore::default();

        assert!(!store.add_print("JPM-C", TradePrint::new(1, 0.0, 100.0, None)));
        assert!(!store.add_print("JPM-C", TradePrint::new(1, 25.0, -1.0, None)));
        assert!(!store.add_print(
            "JPM-C",
            RawPrint { timestamp: None, price: 25.0, size: 100.0, venue: None }
        ));
        assert!(!store.add_print("  ", print(1, 25.0)));
        assert!(store.add_print("JPM-C", print(1, 25.0)));

        assert_eq!(store.len("JPM-C"), 1);
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let store = TickStore::new(3);
        for timestamp in 1..=5 {
            store.add_print("BAC-L", print(timestamp, 25.0 + timestamp as f64 * 0.01));
        }

        let snapshot = store.snapshot("BAC-L");
        let timestamps: Vec<i64> = snapshot.iter().map(|print| print.timestamp).collect();
        assert_eq!(timestamps, vec![3, 4, 5]);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = TickStore::default();
        store.add_print("WFC-Z", print(1, 20.0));

        let snapshot = store.snapshot("WFC-Z");
        store.add_print("WFC-Z", print(2, 20.05));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len("WFC-Z"), 2);
    }

    #[test]
    fn test_symbols_and_clear() {
        let store = TickStore::default();
        store.add_print("B", print(1, 20.0));
        store.add_print("A", print(1, 20.0));

        assert_eq!(store.symbols(), vec![SmolStr::new("A"), SmolStr::new("B")]);

        store.clear("A");
        assert!(store.is_empty("A"));
        assert_eq!(store.symbols().len(), 2);
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let store = Arc::new(TickStore::new(200));

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let symbol = format!("SYM{}", writer % 2);
                    for timestamp in 0..500 {
                        store.add_print(&symbol, print(timestamp, 10.0));
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..200 {
                    assert!(store.snapshot("SYM0").len() <= 200);
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(store.len("SYM0"), 200);
        assert_eq!(store.len("SYM1"), 200);
    }
}
