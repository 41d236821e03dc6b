//! Group Metrics Collection
//!
//! Counters for monitoring a group's lookup path.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Group metrics collector
#[derive(Debug, Default)]
pub struct GroupMetrics {
    gets: AtomicU64,
    main_hits: AtomicU64,
    hot_hits: AtomicU64,

    // Load path
    loads: AtomicU64,
    coalesced_loads: AtomicU64,
    local_loads: AtomicU64,
    local_load_errors: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,

    promotions: AtomicU64,
}

impl GroupMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_main_hit(&self) {
        self.main_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hot_hit(&self) {
        self.hot_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    /// A load that joined another caller's in-flight call
    pub fn record_coalesced_load(&self) {
        self.coalesced_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load_error(&self) {
        self.local_load_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn local_loads(&self) -> u64 {
        self.local_loads.load(Ordering::Relaxed)
    }

    pub fn peer_loads(&self) -> u64 {
        self.peer_loads.load(Ordering::Relaxed)
    }

    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }

    /// Fraction of gets served from either tier
    pub fn hit_ratio(&self) -> f64 {
        let gets = self.gets() as f64;
        if gets == 0.0 {
            0.0
        } else {
            (self.main_hits.load(Ordering::Relaxed) + self.hot_hits.load(Ordering::Relaxed)) as f64
                / gets
        }
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            gets: self.gets(),
            main_hits: self.main_hits.load(Ordering::Relaxed),
            hot_hits: self.hot_hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            coalesced_loads: self.coalesced_loads.load(Ordering::Relaxed),
            local_loads: self.local_loads(),
            local_load_errors: self.local_load_errors.load(Ordering::Relaxed),
            peer_loads: self.peer_loads(),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            promotions: self.promotions(),
        }
    }
}

/// Point-in-time view of a group's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub gets: u64,
    pub main_hits: u64,
    pub hot_hits: u64,
    pub loads: u64,
    pub coalesced_loads: u64,
    pub local_loads: u64,
    pub local_load_errors: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub promotions: u64,
}

impl MetricsSnapshot {
    /// Named counter values, for exporters
    pub fn counters(&self) -> [(&'static str, u64); 10] {
        [
            ("gets", self.gets),
            ("main_hits", self.main_hits),
            ("hot_hits", self.hot_hits),
            ("loads", self.loads),
            ("coalesced_loads", self.coalesced_loads),
            ("local_loads", self.local_loads),
            ("local_load_errors", self.local_load_errors),
            ("peer_loads", self.peer_loads),
            ("peer_errors", self.peer_errors),
            ("promotions", self.promotions),
        ]
    }
}

// =============================================================================
// Tests
// =============================================================================
