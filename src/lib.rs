//! gacache - Distributed Read-Through Cache
//!
//! A library for building a cluster of cooperating cache nodes. Each node
//! hosts named groups; a key is owned by exactly one node (consistent
//! hashing), loaded from a backing store on the owner, and fetched over HTTP
//! by everyone else. Keys that other nodes fetch often are promoted into a
//! small local hot tier.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                           GroupRegistry                           │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  Group "scores"                                                   │
//! │  ┌────────────┐  ┌────────────┐  ┌──────────────────┐            │
//! │  │ main tier  │  │  hot tier  │  │ RequestCoalescer │            │
//! │  └────────────┘  └────────────┘  └──────────────────┘            │
//! │        ▲               ▲                  │                       │
//! │   local Getter    PromotionPolicy    PeerPicker ──▶ HttpPool      │
//! │                                                      └─ HashRing  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Byte-bounded LRU tiers, promotion policy and counters
//! - [`cluster`] - Hash ring, peer capabilities and the HTTP transport
//! - [`group`] - Named namespaces and the registry
//! - [`flight`] - Request coalescing
//! - [`bloom`] - Bloom filter utility
//! - [`error`] - Error types

pub mod bloom;
pub mod cache;
pub mod cluster;
pub mod error;
pub mod flight;
pub mod group;

pub use bloom::BloomFilter;
pub use cache::{BoundedStore, ByteView, MetricsSnapshot, PromotionPolicy};
pub use cluster::{HashRing, HttpPool, PeerGetter, PeerPicker, PeerServer, PoolConfig};
pub use error::{Error, Result};
pub use flight::RequestCoalescer;
pub use group::{
    Clock, Getter, GetterFn, Group, GroupBuilder, GroupRegistry, GroupStats, LoadError,
    ManualClock, SystemClock,
};
