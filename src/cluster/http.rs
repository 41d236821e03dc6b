//! HTTP Peer Pool
//!
//! Client side of the peer transport. An [`HttpPool`] knows this node's own
//! URL and the full peer list; it routes keys over a [`HashRing`] and hands
//! out one [`HttpGetter`] per remote peer.
//!
//! Requests are plain `GET <peer><base><group>/<key>` with both segments
//! percent-encoded; the body of a 200 reply is a protobuf [`Response`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::blocking::Client;
use tracing::{debug, instrument};

use super::peers::{PeerGetter, PeerPicker};
use super::proto::{Request, Response};
use super::ring::{HashRing, DEFAULT_REPLICAS};
use crate::error::{Error, Result};

/// Path prefix for peer requests
pub const DEFAULT_BASE_PATH: &str = "/_gacache/";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the peer pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Path prefix, starting and ending with `/`
    pub base_path: String,

    /// Virtual nodes per peer on the ring
    pub replicas: usize,

    /// Timeout for one peer request
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            request_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Peer Getter
// =============================================================================

/// Fetches values from one remote peer over HTTP
#[derive(Debug, Clone)]
pub struct HttpGetter {
    peer: String,
    base_url: String,
    client: Client,
}

impl HttpGetter {
    fn new(peer: &str, base_path: &str, client: Client) -> Self {
        Self {
            peer: peer.to_string(),
            base_url: format!("{}{}", peer.trim_end_matches('/'), base_path),
            client,
        }
    }

    /// URL for a lookup request
    pub fn url_for(&self, request: &Request) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(&request.group),
            urlencoding::encode(&request.key)
        )
    }

    /// Issue one lookup against the peer
    #[instrument(skip(self), fields(peer = %self.peer))]
    pub fn fetch(&self, request: &Request) -> Result<Response> {
        let url = self.url_for(request);
        let remote = |reason: String| Error::RemoteFetch {
            peer: self.peer.clone(),
            reason,
        };

        let reply = self
            .client
            .get(&url)
            .send()
            .map_err(|e| remote(e.to_string()))?;

        let status = reply.status();
        if !status.is_success() {
            let body = reply.text().unwrap_or_default();
            return Err(remote(format!("server returned {}: {}", status, body.trim())));
        }

        let body = reply
            .bytes()
            .map_err(|e| remote(format!("reading response body: {}", e)))?;
        let response = Response::from_bytes(&body)?;
        debug!(bytes = response.value.len(), "peer fetch succeeded");
        Ok(response)
    }
}

impl PeerGetter for HttpGetter {
    fn get(&self, group: &str, key: &str) -> Result<Vec<u8>> {
        let request = Request {
            group: group.to_string(),
            key: key.to_string(),
        };
        Ok(self.fetch(&request)?.value)
    }

    fn peer_id(&self) -> &str {
        &self.peer
    }
}

// =============================================================================
// Peer Pool
// =============================================================================

/// Routing state swapped as a unit by [`HttpPool::set_peers`]
struct PoolState {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

/// Routes keys to peers and fetches from them over HTTP
pub struct HttpPool {
    self_url: String,
    config: PoolConfig,
    client: Client,
    state: RwLock<PoolState>,
}

impl HttpPool {
    /// Create a pool for the node reachable at `self_url`
    pub fn new(self_url: impl Into<String>) -> Result<Self> {
        Self::with_config(self_url, PoolConfig::default())
    }

    /// Create a pool with custom configuration
    pub fn with_config(self_url: impl Into<String>, config: PoolConfig) -> Result<Self> {
        if !config.base_path.starts_with('/') || !config.base_path.ends_with('/') {
            return Err(Error::Configuration(format!(
                "base path must start and end with '/': {}",
                config.base_path
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            self_url: self_url.into(),
            state: RwLock::new(PoolState {
                ring: HashRing::new(config.replicas),
                getters: HashMap::new(),
            }),
            config,
            client,
        })
    }

    /// Replace the peer list
    ///
    /// The list should include this node's own URL so that keys it owns are
    /// served locally. A new ring is built off to the side and swapped in.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let peers: Vec<String> = peers.into_iter().map(|p| p.as_ref().to_string()).collect();

        let mut ring = HashRing::new(self.config.replicas);
        ring.add_nodes(&peers);
        let getters = peers
            .iter()
            .map(|peer| {
                let getter = HttpGetter::new(peer, &self.config.base_path, self.client.clone());
                (peer.clone(), Arc::new(getter))
            })
            .collect();

        let replicas = ring.replicas();
        *self.state.write() = PoolState { ring, getters };
        debug!(
            self_url = %self.self_url,
            peers = peers.len(),
            replicas,
            "peer set replaced"
        );
    }

    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Known peers, sorted
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<_> = self.state.read().getters.keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Owner of `key` on the ring, including this node
    pub fn owner(&self, key: &str) -> Option<String> {
        self.state.read().ring.route(key).map(str::to_string)
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.read();
        let owner = state.ring.route(key)?;
        if owner == self.self_url {
            return None;
        }

        debug!(key, peer = owner, "picked remote owner");
        let getter = state.getters.get(owner)?;
        Some(Arc::clone(getter) as Arc<dyn PeerGetter>)
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_url", &self.self_url)
            .field("config", &self.config)
            .field("peers", &self.state.read().getters.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const NODES: [&str; 3] = [
        "http://localhost:8001",
        "http://localhost:8002",
        "http://localhost:8003",
    ];

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.base_path, "/_gacache/");
        assert_eq!(config.replicas, 50);
    }

    #[test]
    fn test_rejects_malformed_base_path() {
        let config = PoolConfig {
            base_path: "_gacache".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpPool::with_config(NODES[0], config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_no_peers_means_local() {
        let pool = HttpPool::new(NODES[0]).unwrap();
        assert!(pool.pick_peer("Tom").is_none());
        assert!(pool.owner("Tom").is_none());
    }

    #[test]
    fn test_own_keys_are_not_picked() {
        let pool = HttpPool::new(NODES[0]).unwrap();
        pool.set_peers(NODES);

        for i in 0..200 {
            let key = format!("key-{i}");
            let owner = pool.owner(&key).unwrap();
            match pool.pick_peer(&key) {
                Some(peer) => {
                    assert_ne!(owner, NODES[0]);
                    assert_eq!(peer.peer_id(), owner);
                }
                None => assert_eq!(owner, NODES[0]),
            }
        }
    }

    #[test]
    fn test_every_node_agrees_on_owner() {
        let pools: Vec<_> = NODES
            .iter()
            .map(|url| {
                let pool = HttpPool::new(*url).unwrap();
                pool.set_peers(NODES);
                pool
            })
            .collect();

        for i in 0..100 {
            let key = format!("key-{i}");
            let owner = pools[0].owner(&key);
            assert!(pools.iter().all(|p| p.owner(&key) == owner));
            let remote_pickers = pools.iter().filter(|p| p.pick_peer(&key).is_some()).count();
            assert_eq!(remote_pickers, NODES.len() - 1);
        }
    }

    #[test]
    fn test_request_url_is_percent_encoded() {
        let getter = HttpGetter::new("http://localhost:8001/", DEFAULT_BASE_PATH, Client::new());
        let url = getter.url_for(&Request {
            group: "my scores".to_string(),
            key: "a/b".to_string(),
        });
        assert_eq!(url, "http://localhost:8001/_gacache/my%20scores/a%2Fb");
    }

    #[test]
    fn test_set_peers_replaces_previous_set() {
        let pool = HttpPool::new(NODES[0]).unwrap();
        pool.set_peers(NODES);
        pool.set_peers([NODES[0]]);

        assert_eq!(pool.peers(), vec![NODES[0].to_string()]);
        assert!(pool.pick_peer("anything").is_none());
    }

    #[test]
    fn test_rebuilt_ring_keeps_configured_replicas() {
        let config = PoolConfig {
            replicas: 7,
            ..Default::default()
        };
        let pool = HttpPool::with_config(NODES[0], config).unwrap();
        pool.set_peers(NODES);
        assert_eq!(pool.state.read().ring.replicas(), 7);

        pool.set_peers([NODES[1]]);
        assert_eq!(pool.state.read().ring.replicas(), 7);
    }
}
