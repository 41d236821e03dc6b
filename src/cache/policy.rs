//! Hot-Key Promotion Policy
//!
//! Decides when a value fetched from a remote owner is worth keeping in the
//! local hot tier. Tracking is per key and starts on the first remote fetch:
//!
//! ```text
//! unseen ──fetch──▶ tracked(1) ──fetch──▶ tracked(n) ──rate ≥ threshold──▶ promoted
//!   ▲                                                                       │
//!   └──────────────────────────── evicted from hot tier ────────────────────┘
//! ```
//!
//! The rate is `fetches / max(1, round(elapsed minutes))`.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Fraction of the total budget given to the hot tier is `1 / DEFAULT_HOT_DIVISOR`
pub const DEFAULT_HOT_DIVISOR: usize = 8;

/// Smallest divisor that still leaves the main tier a share of the budget
pub const MIN_HOT_DIVISOR: usize = 2;

/// Remote fetches per minute at which a key is promoted
pub const DEFAULT_PROMOTION_QPS: f64 = 10.0;

/// Promotion policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionPolicy {
    /// Remote fetches per elapsed minute required to promote
    pub qps_threshold: f64,
    /// Hot tier receives `total / hot_divisor` bytes
    pub hot_divisor: usize,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            qps_threshold: DEFAULT_PROMOTION_QPS,
            hot_divisor: DEFAULT_HOT_DIVISOR,
        }
    }
}

impl PromotionPolicy {
    /// Reject settings that cannot produce two bounded tiers
    pub fn validate(&self) -> Result<()> {
        if self.hot_divisor < MIN_HOT_DIVISOR {
            return Err(Error::Configuration(format!(
                "hot_divisor must be at least {}, got {}",
                MIN_HOT_DIVISOR, self.hot_divisor
            )));
        }
        if !(self.qps_threshold.is_finite() && self.qps_threshold > 0.0) {
            return Err(Error::Configuration(format!(
                "qps_threshold must be a positive number, got {}",
                self.qps_threshold
            )));
        }
        Ok(())
    }

    /// Split a total byte budget into `(main, hot)`
    ///
    /// A zero total stays unlimited for both tiers. A non-zero total always
    /// leaves the main tier at least one byte; a hot share that rounds down
    /// to zero comes back as `None`, meaning the hot tier is disabled.
    pub fn split_budget(&self, total_bytes: usize) -> (usize, Option<usize>) {
        if total_bytes == 0 {
            return (0, Some(0));
        }
        let hot = total_bytes / self.hot_divisor.max(MIN_HOT_DIVISOR);
        (total_bytes - hot, (hot > 0).then_some(hot))
    }

    /// Fetch rate for a tracked key at `now`
    pub fn rate(&self, stats: &KeyStats, now: Instant) -> f64 {
        let minutes = elapsed_minutes(now.saturating_duration_since(stats.first_access));
        stats.remote_fetch_count as f64 / minutes as f64
    }

    /// Record one more remote fetch and report whether the key should be promoted
    pub fn record_fetch(&self, stats: &mut KeyStats, now: Instant) -> bool {
        stats.remote_fetch_count += 1;
        self.rate(stats, now) >= self.qps_threshold
    }
}

/// Per-key remote fetch tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStats {
    /// When the key was first fetched remotely
    pub first_access: Instant,
    /// Remote fetches since `first_access`
    pub remote_fetch_count: u64,
}

impl KeyStats {
    /// Stats for a key seen remotely for the first time
    pub fn first_fetch(now: Instant) -> Self {
        Self {
            first_access: now,
            remote_fetch_count: 1,
        }
    }
}

/// Whole minutes, rounded to nearest, never below one
fn elapsed_minutes(elapsed: Duration) -> u64 {
    let minutes = (elapsed.as_secs_f64() / 60.0).round() as u64;
    minutes.max(1)
}

// =============================================================================
// Tests
// =============================================================================
