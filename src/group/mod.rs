//! Groups
//!
//! A group is a named cache namespace with its own backing store, byte
//! budget and peer router. The registry maps names to groups so the peer
//! server can dispatch incoming lookups.

mod clock;
mod getter;
mod namespace;
mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use getter::{Getter, GetterFn, LoadError};
pub use namespace::{FlightKey, Group, GroupBuilder, GroupStats, SharedCoalescer};
pub use registry::GroupRegistry;
