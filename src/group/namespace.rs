//! Group - A Named Cache Namespace
//!
//! Orchestrates the lookup path for one namespace:
//!
//! ```text
//! get(key)
//!   ├─ main tier hit ───────────────────────────────▶ value
//!   ├─ hot tier hit ────────────────────────────────▶ value
//!   └─ coalesced load (group, key)
//!        ├─ remote owner? ── fetch ── ok ── track / promote ──▶ value
//!        │                     └─ err ─┐
//!        └─ local getter ◀─────────────┘ ── fill main tier ──▶ value
//! ```
//!
//! The main tier only ever holds values this node loaded from its own
//! backing store. Values fetched from peers reach the hot tier through
//! promotion and nowhere else.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::getter::{Getter, LoadError};
use crate::cache::{
    ByteView, GroupMetrics, KeyStats, LockedStore, MetricsSnapshot, PromotionPolicy, StoreStats,
};
use crate::cluster::{PeerGetter, PeerPicker};
use crate::error::{Error, Result};
use crate::flight::RequestCoalescer;

/// Coalescing key: `(group name, key)`
pub type FlightKey = (String, String);

/// Coalescer that may be shared by every group of a registry
pub type SharedCoalescer = Arc<RequestCoalescer<FlightKey, ByteView>>;

/// Builder for [`Group`]
pub struct GroupBuilder {
    name: String,
    cache_bytes: usize,
    getter: Option<Arc<dyn Getter>>,
    policy: PromotionPolicy,
    clock: Option<Arc<dyn Clock>>,
    coalescer: Option<SharedCoalescer>,
}

impl GroupBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache_bytes: 0,
            getter: None,
            policy: PromotionPolicy::default(),
            clock: None,
            coalescer: None,
        }
    }

    /// Total byte budget split between main and hot tiers (0 = unlimited)
    pub fn cache_bytes(mut self, cache_bytes: usize) -> Self {
        self.cache_bytes = cache_bytes;
        self
    }

    /// Backing store
    pub fn getter(mut self, getter: impl Getter + 'static) -> Self {
        self.getter = Some(Arc::new(getter));
        self
    }

    /// Backing store shared with other owners
    pub fn shared_getter(mut self, getter: Arc<dyn Getter>) -> Self {
        self.getter = Some(getter);
        self
    }

    pub fn policy(mut self, policy: PromotionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn coalescer(mut self, coalescer: SharedCoalescer) -> Self {
        self.coalescer = Some(coalescer);
        self
    }

    pub(crate) fn has_coalescer(&self) -> bool {
        self.coalescer.is_some()
    }

    /// Build the group; fails without a backing store or with an unusable policy
    pub fn build(self) -> Result<Group> {
        self.policy.validate()?;
        let getter = self.getter.ok_or_else(|| {
            Error::Configuration(format!("group {} has no backing getter", self.name))
        })?;

        Ok(Group::new(
            self.name,
            self.cache_bytes,
            getter,
            self.policy,
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            self.coalescer.unwrap_or_default(),
        ))
    }
}

/// A named cache namespace
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    main_cache: LockedStore,
    hot_cache: LockedStore,
    /// False when the budget is too small to give the hot tier any bytes
    hot_enabled: bool,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    loader: SharedCoalescer,
    /// Remote fetch tracking, guarded per group
    key_stats: Mutex<HashMap<String, KeyStats>>,
    policy: PromotionPolicy,
    clock: Arc<dyn Clock>,
    metrics: GroupMetrics,
}

impl Group {
    pub(crate) fn new(
        name: String,
        cache_bytes: usize,
        getter: Arc<dyn Getter>,
        policy: PromotionPolicy,
        clock: Arc<dyn Clock>,
        loader: SharedCoalescer,
    ) -> Self {
        let (main_bytes, hot_bytes) = policy.split_budget(cache_bytes);
        Self {
            name,
            getter,
            main_cache: LockedStore::new(main_bytes),
            hot_cache: LockedStore::new(hot_bytes.unwrap_or(0)),
            hot_enabled: hot_bytes.is_some(),
            peers: OnceCell::new(),
            loader,
            key_stats: Mutex::new(HashMap::new()),
            policy,
            clock,
            metrics: GroupMetrics::new(),
        }
    }

    /// Start building a group
    pub fn builder(name: impl Into<String>) -> GroupBuilder {
        GroupBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach the peer router; a group accepts exactly one
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers.set(peers).map_err(|_| {
            Error::Configuration(format!(
                "register_peers called more than once for group {}",
                self.name
            ))
        })
    }

    /// Look up a key, loading it on a miss
    pub fn get(&self, key: &str) -> Result<ByteView> {
        self.metrics.record_get();
        if key.is_empty() {
            return Err(Error::InvalidKey {
                group: self.name.clone(),
            });
        }

        if let Some(value) = self.main_cache.get(key) {
            debug!(group = %self.name, key, "main cache hit");
            self.metrics.record_main_hit();
            return Ok(value);
        }
        if let Some(value) = self.hot_cache.get(key) {
            debug!(group = %self.name, key, "hot cache hit");
            self.metrics.record_hot_hit();
            return Ok(value);
        }

        self.load(key)
    }

    /// Load a key, coalescing with concurrent loads of the same key
    pub fn load(&self, key: &str) -> Result<ByteView> {
        self.metrics.record_load();
        let flight_key = (self.name.clone(), key.to_string());
        let (result, shared) = self
            .loader
            .execute_tracked(flight_key, || self.load_uncoalesced(key));

        if shared {
            self.metrics.record_coalesced_load();
        }
        result
    }

    fn load_uncoalesced(&self, key: &str) -> Result<ByteView> {
        if let Some(peer) = self.peers.get().and_then(|picker| picker.pick_peer(key)) {
            match self.load_from_peer(peer.as_ref(), key) {
                Ok(value) => {
                    self.record_remote_fetch(key, &value);
                    return Ok(value);
                }
                Err(e) => {
                    self.metrics.record_peer_error();
                    warn!(
                        group = %self.name,
                        key,
                        peer = peer.peer_id(),
                        error = %e,
                        "peer fetch failed, loading locally"
                    );
                }
            }
        }

        self.load_locally(key)
    }

    /// Load from the backing store and fill the main tier
    pub fn load_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = self.getter.get(key).map_err(|e| {
            self.metrics.record_local_load_error();
            match e {
                LoadError::Missing => Error::SourceMiss {
                    group: self.name.clone(),
                    key: key.to_string(),
                },
                LoadError::Failed(reason) => Error::SourceError {
                    group: self.name.clone(),
                    key: key.to_string(),
                    reason,
                },
            }
        })?;

        let value = ByteView::from(bytes);
        self.main_cache.put(key, value.clone());
        self.metrics.record_local_load();
        Ok(value)
    }

    /// Fetch a key from a remote peer
    ///
    /// The result is not written to any tier here.
    pub fn load_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let bytes = peer.get(&self.name, key)?;
        self.metrics.record_peer_load();
        Ok(ByteView::from(bytes))
    }

    /// Track a successful remote fetch and promote the key once it is hot
    fn record_remote_fetch(&self, key: &str, value: &ByteView) {
        if !self.hot_enabled {
            return;
        }
        let now = self.clock.now();
        let promote = {
            let mut stats = self.key_stats.lock();
            match stats.entry(key.to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(KeyStats::first_fetch(now));
                    false
                }
                Entry::Occupied(mut slot) => {
                    let promote = self.policy.record_fetch(slot.get_mut(), now);
                    if promote {
                        slot.remove();
                    }
                    promote
                }
            }
        };

        if promote {
            self.hot_cache.put(key, value.clone());
            self.metrics.record_promotion();
            info!(group = %self.name, key, "promoted remote key to hot cache");
        }
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Tier holding locally loaded values
    pub fn main_cache(&self) -> &LockedStore {
        &self.main_cache
    }

    /// Tier holding promoted remote values
    pub fn hot_cache(&self) -> &LockedStore {
        &self.hot_cache
    }

    /// Whether remote keys can be promoted at all
    pub fn hot_tier_enabled(&self) -> bool {
        self.hot_enabled
    }

    /// Remote fetch tracking for `key`, if it is being tracked
    pub fn key_stats(&self, key: &str) -> Option<KeyStats> {
        self.key_stats.lock().get(key).copied()
    }

    /// Number of keys with remote fetch tracking
    pub fn tracked_keys(&self) -> usize {
        self.key_stats.lock().len()
    }

    pub fn policy(&self) -> &PromotionPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Statistics for the whole group
    pub fn stats(&self) -> GroupStats {
        GroupStats {
            name: self.name.clone(),
            main: self.main_cache.stats(),
            hot: self.hot_cache.stats(),
            tracked_keys: self.tracked_keys(),
            counters: self.metrics(),
        }
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("main_cache", &self.main_cache)
            .field("hot_cache", &self.hot_cache)
            .field("has_peers", &self.peers.get().is_some())
            .finish()
    }
}

/// Point-in-time statistics for a group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub name: String,
    pub main: StoreStats,
    pub hot: StoreStats,
    pub tracked_keys: usize,
    pub counters: MetricsSnapshot,
}

// =============================================================================
// Tests
// =============================================================================
