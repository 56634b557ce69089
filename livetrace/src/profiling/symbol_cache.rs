//! # Symbol Cache
//!
//! Lazy, memoized address → [`Symbol`] resolution. Entries live in the
//! aggregation store's symbol table and are never mutated or evicted within a
//! session, so a resolved `Arc<Symbol>` can be held without the lock.
//!
//! The binding is queried without holding the lock. Two lookups racing on
//! the same address may both resolve it; the first insertion wins and the
//! loser receives the winner's entry.
//!
//! Misses are not cached: an address that fails to resolve is asked again
//! the next time it is sampled, since a library loaded later may cover it.
//! For a persistently unresolvable hot address this repeats the binding
//! query on every sample.

use log::trace;
use std::sync::Arc;

use livetrace_common::Symbol;

use super::aggregation::AggregationStore;

/// Symbol lookups against the current session's symbol table
#[derive(Debug, Clone)]
pub struct SymbolCache {
    store: AggregationStore,
}

impl SymbolCache {
    #[must_use]
    pub fn new(store: AggregationStore) -> Self {
        Self { store }
    }

    /// Cached symbol for `address`, resolving it with `resolve` on a miss.
    ///
    /// Returns `None` when `resolve` cannot resolve it; nothing is cached then.
    pub fn lookup(
        &self,
        address: u64,
        resolve: impl FnOnce(u64) -> Option<Symbol>,
    ) -> Option<Arc<Symbol>> {
        if let Some(symbol) = self.store.lock().symbols.get(&address) {
            return Some(Arc::clone(symbol));
        }

        let Some(symbol) = resolve(address) else {
            trace!("Unresolved address 0x{address:x}");
            return None;
        };

        let mut data = self.store.lock();
        Some(Arc::clone(data.symbols.entry(address).or_insert_with(|| Arc::new(symbol))))
    }

    /// Number of resolved addresses
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.lock().symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn symbol(name: &str, start: u64) -> Symbol {
        Symbol {
            source_file: "src/main.rs".to_string(),
            source_line: 42,
            function_name: name.to_string(),
            function_start_address: start,
            displacement: 4,
        }
    }

    #[test]
    fn test_lookup_caches_hit() {
        let cache = SymbolCache::new(AggregationStore::new());
        let calls = AtomicUsize::new(0);
        let resolve = |addr: u64| {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(symbol("work", addr - 4))
        };

        let first = cache.lookup(0x1004, resolve).unwrap();
        let second = cache.lookup(0x1004, resolve).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, symbol("work", 0x1000));
    }

    #[test]
    fn test_miss_is_not_cached() {
        let cache = SymbolCache::new(AggregationStore::new());
        let calls = AtomicUsize::new(0);
        let unresolvable = |_addr: u64| {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        };

        assert!(cache.lookup(0xdead, unresolvable).is_none());
        assert!(cache.lookup(0xdead, unresolvable).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());

        // Resolution may succeed later
        assert!(cache.lookup(0xdead, |a| Some(symbol("late", a))).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_first_insertion_wins() {
        let cache = SymbolCache::new(AggregationStore::new());
        let first = cache.lookup(0x20, |a| Some(symbol("first", a))).unwrap();
        let second = cache.lookup(0x20, |a| Some(symbol("second", a))).unwrap();
        assert_eq!(second.function_name, "first");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_concurrent_lookups_single_entry() {
        const THREADS: usize = 8;
        let cache = SymbolCache::new(AggregationStore::new());
        let barrier = Barrier::new(THREADS);

        let results: Vec<Arc<Symbol>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.lookup(0x4242, |a| Some(symbol("hot", a))).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.len(), 1);
        assert!(results.iter().all(|s| Arc::ptr_eq(s, &results[0])));
    }
}
