//! Locked Cache Tier
//!
//! Thread-safe wrapper around [`BoundedStore`] used for a group's main and hot
//! tiers. One mutex covers lookup, insertion and the evictions an insertion
//! triggers, so recency order reflects the order callers were serialized in.
//!
//! The inner store is materialized on the first `put`; a tier that is never
//! written costs one empty mutex.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::lru::BoundedStore;
use super::view::ByteView;

/// A lock-guarded, lazily initialized cache tier
pub struct LockedStore {
    inner: Mutex<Option<BoundedStore<ByteView>>>,
    /// Budget in bytes (0 = unlimited)
    max_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: Arc<AtomicU64>,
}

impl LockedStore {
    /// Create a tier with a byte budget (0 = unlimited)
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(None),
            max_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let mut guard = self.inner.lock();
        let found = guard.as_mut().and_then(|store| store.get(key).cloned());

        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Insert or replace a value
    pub fn put(&self, key: &str, value: ByteView) {
        let mut guard = self.inner.lock();
        let store = guard.get_or_insert_with(|| {
            let evictions = Arc::clone(&self.evictions);
            BoundedStore::with_eviction_callback(self.max_bytes, move |_key, _value| {
                evictions.fetch_add(1, Ordering::Relaxed);
            })
        });
        store.put(key, value);
    }

    /// Check membership without touching recency
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .as_ref()
            .is_some_and(|store| store.contains(key))
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, BoundedStore::len)
    }

    /// True when no entries are resident
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes accounted to live entries
    pub fn used_bytes(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, BoundedStore::used_bytes)
    }

    /// Configured budget
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// True once the first write has materialized the store
    pub fn is_materialized(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Eviction count
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Tier statistics
    pub fn stats(&self) -> StoreStats {
        let (entries, used_bytes) = self
            .inner
            .lock()
            .as_ref()
            .map_or((0, 0), |store| (store.len(), store.used_bytes()));

        StoreStats {
            entries,
            used_bytes,
            max_bytes: self.max_bytes,
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
        }
    }
}

impl std::fmt::Debug for LockedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedStore")
            .field("max_bytes", &self.max_bytes)
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

/// Point-in-time statistics for one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    /// Number of entries
    pub entries: usize,
    /// Bytes accounted to entries
    pub used_bytes: usize,
    /// Budget in bytes (0 = unlimited)
    pub max_bytes: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Eviction count
    pub evictions: u64,
}

// =============================================================================
// Tests
// =============================================================================
