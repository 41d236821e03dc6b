//! Cache Tiers
//!
//! Storage building blocks for a group.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Group                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Main tier (7/8 budget)          │  Hot tier (1/8 budget)    │
//! │  ┌────────────────────────────┐  │  ┌─────────────────────┐  │
//! │  │ LockedStore                │  │  │ LockedStore         │  │
//! │  │  └─ BoundedStore<ByteView> │  │  │  └─ BoundedStore    │  │
//! │  │ locally loaded values only │  │  │ promoted remote keys│  │
//! │  └────────────────────────────┘  │  └─────────────────────┘  │
//! │                                  │            ▲              │
//! │                                  │   PromotionPolicy         │
//! │                                  │   (fetches per minute)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod lru;
mod metrics;
mod policy;
mod store;
mod view;

pub use lru::{BoundedStore, Weighted};
pub use metrics::{GroupMetrics, MetricsSnapshot};
pub use policy::{KeyStats, PromotionPolicy, DEFAULT_HOT_DIVISOR, DEFAULT_PROMOTION_QPS, MIN_HOT_DIVISOR};
pub use store::{LockedStore, StoreStats};
pub use view::ByteView;
