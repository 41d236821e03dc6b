//! Peer Capabilities
//!
//! Ports through which a group reaches the rest of the cluster. The HTTP
//! transport in [`super::http`] is one implementation; tests plug in
//! in-process fakes.

use std::sync::Arc;

use crate::error::Result;

/// Chooses the peer that owns a key
pub trait PeerPicker: Send + Sync {
    /// Remote owner of `key`, or `None` when the key is owned locally or no
    /// peers are configured
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// Fetches a value from one remote peer
pub trait PeerGetter: Send + Sync {
    /// Fetch `key` of `group` from the peer
    ///
    /// Any error is treated by the caller as "no remote data".
    fn get(&self, group: &str, key: &str) -> Result<Vec<u8>>;

    /// Peer identifier used in logs and errors
    fn peer_id(&self) -> &str;
}
