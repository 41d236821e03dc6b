//! Consistent Hash Ring
//!
//! Maps keys to peers through a sorted ring of virtual-node positions. Every
//! peer owns `replicas` positions, each the hash of `"{index}{peer}"`; a key
//! belongs to the peer holding the first position at or after the key's hash,
//! wrapping around to the lowest position.
//!
//! ```text
//!           0 ─────────────────────────────────────────▶ u32::MAX
//!   ring:   ●a0     ●b1   ●a1        ●c0    ●b0      ●c1
//!   key:          ▲ hash(k) ──▶ owner = b (position b1)
//! ```

use std::collections::HashMap;

/// Hash function used for ring positions and key lookups
pub type HashFn = fn(&[u8]) -> u32;

/// Default virtual nodes per peer
pub const DEFAULT_REPLICAS: usize = 50;

/// CRC32C of the input
pub fn crc32c_hash(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Consistent hash ring over peer identifiers
#[derive(Debug, Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Sorted virtual-node positions
    positions: Vec<u32>,
    /// Position to owning peer
    owners: HashMap<u32, String>,
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

impl HashRing {
    /// Create an empty ring with the default hash function
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, crc32c_hash)
    }

    /// Create an empty ring with a custom hash function
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            positions: Vec::new(),
            owners: HashMap::new(),
        }
    }

    /// Add peers to the ring
    ///
    /// Adding a peer twice creates duplicate positions; callers add each peer
    /// once.
    pub fn add_nodes<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref();
            for i in 0..self.replicas {
                let position = (self.hash)(format!("{i}{id}").as_bytes());
                self.positions.push(position);
                self.owners.insert(position, id.to_string());
            }
        }
        self.positions.sort_unstable();
    }

    /// Owner of `key`, or `None` when the ring is empty
    pub fn route(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.positions.partition_point(|&p| p < hash);
        let position = self.positions[idx % self.positions.len()];
        self.owners.get(&position).map(String::as_str)
    }

    /// Number of virtual-node positions
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True when no peers have been added
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Virtual nodes per peer
    pub fn replicas(&self) -> usize {
        self.replicas
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Parses the input as a decimal number, so positions are predictable
    fn numeric_hash(data: &[u8]) -> u32 {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    #[test]
    fn test_empty_ring_has_no_owner() {
        let ring = HashRing::default();
        assert!(ring.is_empty());
        assert_eq!(ring.route("anything"), None);
    }

    #[test]
    fn test_routing_with_numeric_hash() {
        // 2 -> 2, 12, 22; 4 -> 4, 14, 24; 6 -> 6, 16, 26
        let mut ring = HashRing::with_hasher(3, numeric_hash);
        ring.add_nodes(["2", "4", "6"]);
        assert_eq!(ring.len(), 9);

        let cases = [("2", "2"), ("11", "2"), ("13", "4"), ("15", "6"), ("23", "4"), ("27", "2")];
        for (key, owner) in cases {
            assert_eq!(ring.route(key), Some(owner), "key {key}");
        }

        // 8 -> 8, 18, 28
        ring.add_nodes(["8"]);
        assert_eq!(ring.route("27"), Some("8"));
        assert_eq!(ring.route("2"), Some("2"));
        assert_eq!(ring.route("13"), Some("4"));
        assert_eq!(ring.route("15"), Some("6"));
    }

    #[test]
    fn test_positions_stay_sorted() {
        let mut ring = HashRing::new(20);
        ring.add_nodes(["http://a:8001", "http://b:8002"]);
        ring.add_nodes(["http://c:8003"]);

        assert!(ring.positions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(ring.len(), 60);
    }

    #[test]
    fn test_route_is_deterministic() {
        let mut ring = HashRing::default();
        ring.add_nodes(["http://localhost:8001", "http://localhost:8002", "http://localhost:8003"]);

        for i in 0..100 {
            let key = format!("key-{i}");
            assert_eq!(ring.route(&key), ring.route(&key));
        }
    }

    #[test]
    fn test_virtual_nodes_spread_keys() {
        let mut ring = HashRing::default();
        let peers = ["http://localhost:8001", "http://localhost:8002", "http://localhost:8003"];
        ring.add_nodes(peers);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for i in 0..3000 {
            let key = format!("user:{i}");
            *counts.entry(ring.route(&key).unwrap()).or_default() += 1;
        }

        assert_eq!(counts.len(), 3);
        assert!(counts.values().all(|&c| c > 300), "skewed: {counts:?}");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn prop_adding_a_node_only_moves_keys_onto_it(
                keys in prop::collection::vec("[a-z0-9]{1,12}", 1..200),
            ) {
                let mut ring = HashRing::new(10);
                ring.add_nodes(["n1", "n2", "n3"]);
                let before: Vec<String> = keys
                    .iter()
                    .map(|k| ring.route(k).unwrap().to_string())
                    .collect();

                ring.add_nodes(["n4"]);
                for (key, old_owner) in keys.iter().zip(before) {
                    let new_owner = ring.route(key).unwrap();
                    prop_assert!(new_owner == old_owner || new_owner == "n4");
                }
            }
        }
    }
}
