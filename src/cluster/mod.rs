//! Cluster Layer
//!
//! Everything a group needs to talk to other nodes:
//!
//! ```text
//!   Group ──pick_peer──▶ HttpPool ──route──▶ HashRing
//!     │                     │
//!     │                     └─▶ HttpGetter ──GET /_gacache/<group>/<key>──▶ PeerServer (remote)
//!     │                                                                      │
//!     └──────────────────────── Response{value} (protobuf) ◀─────────────────┘
//! ```

mod http;
mod peers;
pub mod proto;
mod ring;
mod server;

pub use http::{HttpGetter, HttpPool, PoolConfig, DEFAULT_BASE_PATH};
pub use peers::{PeerGetter, PeerPicker};
pub use ring::{crc32c_hash, HashFn, HashRing, DEFAULT_REPLICAS};
pub use server::PeerServer;
