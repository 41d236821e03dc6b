//! Byte-Budgeted LRU Store
//!
//! Single-threaded least-recently-used store whose capacity is a byte budget
//! rather than an entry count. Callers serialize access themselves; see
//! [`super::store::LockedStore`] for the locked wrapper used by groups.
//!
//! # Design
//!
//! ```text
//!   index: HashMap<String, slot>
//!                 │
//!                 ▼
//!   head ──► [slot] ◄──► [slot] ◄──► [slot] ◄── tail
//!   (MRU)                                       (LRU)
//! ```
//!
//! - Nodes live in a slot vector with a free list; links are slot indices
//! - `get` moves the node to the head, eviction pops the tail, both O(1)
//! - Entry size is `key.len() + value.weight()`
//! - `max_bytes == 0` disables eviction

use std::collections::HashMap;
use std::fmt;

/// Values that report their own payload size
pub trait Weighted {
    /// Payload size in bytes, excluding structural overhead
    fn weight(&self) -> usize;
}

impl Weighted for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}

/// Callback invoked with each evicted entry
pub type EvictionCallback<V> = Box<dyn FnMut(String, V) + Send>;

struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<V: Weighted> Node<V> {
    #[inline]
    fn size(&self) -> usize {
        self.key.len() + self.value.weight()
    }
}

/// Byte-budgeted LRU store
pub struct BoundedStore<V> {
    /// Budget in bytes (0 = unlimited)
    max_bytes: usize,
    /// Sum of live entry sizes
    used_bytes: usize,
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V: Weighted> BoundedStore<V> {
    /// Create a store with a byte budget (0 = unlimited)
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            on_evicted: None,
        }
    }

    /// Create a store that reports evictions to `on_evicted`
    pub fn with_eviction_callback(
        max_bytes: usize,
        on_evicted: impl FnMut(String, V) + Send + 'static,
    ) -> Self {
        let mut store = Self::new(max_bytes);
        store.on_evicted = Some(Box::new(on_evicted));
        store
    }

    /// Look up a key, marking it most recently used on a hit
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.detach(idx);
        self.attach_front(idx);
        Some(&self.node(idx).value)
    }

    /// Check membership without touching recency
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or replace a value, then evict until back under budget
    pub fn put(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(&idx) = self.index.get(&key) {
            let new_weight = value.weight();
            let node = self.node_mut(idx);
            let old_weight = node.value.weight();
            node.value = value;
            self.used_bytes = self.used_bytes + new_weight - old_weight;
            self.detach(idx);
            self.attach_front(idx);
        } else {
            let node = Node {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            };
            self.used_bytes += node.size();
            let idx = self.alloc(node);
            self.index.insert(key, idx);
            self.attach_front(idx);
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if self.remove_oldest().is_none() {
                break;
            }
        }
    }

    /// Evict the least recently used entry
    ///
    /// The eviction callback, if any, receives the entry; the return value is
    /// `Some(())` when something was evicted.
    pub fn remove_oldest(&mut self) -> Option<()> {
        let idx = self.tail?;
        self.detach(idx);
        let node = self.slots[idx].take()?;
        self.free.push(idx);
        self.index.remove(&node.key);
        self.used_bytes -= node.size();

        if let Some(callback) = self.on_evicted.as_mut() {
            callback(node.key, node.value);
        }
        Some(())
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes currently accounted to live entries
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Configured budget (0 = unlimited)
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Iterate entries from most to least recently used
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            store: self,
            cursor: self.head,
        }
    }

    // -------------------------------------------------------------------------
    // Slot list plumbing
    // -------------------------------------------------------------------------

    fn alloc(&mut self, node: Node<V>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn node(&self, idx: usize) -> &Node<V> {
        match self.slots[idx].as_ref() {
            Some(node) => node,
            None => unreachable!("linked slot {idx} is vacant"),
        }
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<V> {
        match self.slots[idx].as_mut() {
            Some(node) => node,
            None => unreachable!("linked slot {idx} is vacant"),
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };

        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }

        let node = self.node_mut(idx);
        node.prev = None;
        node.next = None;
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.node_mut(h).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }
}

impl<V> fmt::Debug for BoundedStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedStore")
            .field("max_bytes", &self.max_bytes)
            .field("used_bytes", &self.used_bytes)
            .field("len", &self.index.len())
            .finish()
    }
}

/// Iterator over entries, most recently used first
pub struct Iter<'a, V> {
    store: &'a BoundedStore<V>,
    cursor: Option<usize>,
}

impl<'a, V: Weighted> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = self.store.node(idx);
        self.cursor = node.next;
        Some((node.key.as_str(), &node.value))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn keys(store: &BoundedStore<String>) -> Vec<String> {
        store.iter().map(|(k, _)| k.to_string()).collect()
    }

    #[test]
    fn test_get_hit_and_miss() {
        let mut store = BoundedStore::new(0);
        store.put("key1", "value1".to_string());

        assert_eq!(store.get("key1").map(String::as_str), Some("value1"));
        assert!(store.get("key2").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_size_accounting_uses_key_and_value_length() {
        let mut store = BoundedStore::new(0);
        store.put("k1", "v1".to_string());
        assert_eq!(store.used_bytes(), 4);

        store.put("k1", "longer".to_string());
        assert_eq!(store.used_bytes(), 8);
        assert_eq!(store.len(), 1);

        store.put("k1", "v".to_string());
        assert_eq!(store.used_bytes(), 3);
    }

    #[test]
    fn test_eviction_on_overflow() {
        let (k1, k2, k3) = ("key1", "key2", "key3");
        let (v1, v2, v3) = ("value1", "value2", "value3");
        let cap = k1.len() + k2.len() + v1.len() + v2.len();
        let mut store = BoundedStore::new(cap);

        store.put(k1, v1.to_string());
        store.put(k2, v2.to_string());
        store.put(k3, v3.to_string());

        assert!(store.get(k1).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_twenty_byte_budget_evicts_first_key() {
        let mut store = BoundedStore::new(20);
        for i in 1..=5 {
            store.put(format!("k{i}"), format!("v{i}"));
        }
        assert_eq!(store.used_bytes(), 20);
        assert!(store.contains("k1"));

        store.put("k6", "v6".to_string());
        assert!(store.get("k1").is_none());
        assert!(store.get("k2").is_some());
        assert!(store.used_bytes() <= 20);
    }

    #[test]
    fn test_get_protects_from_next_eviction() {
        let mut store = BoundedStore::new(12);
        store.put("k1", "v1".to_string());
        store.put("k2", "v2".to_string());
        store.put("k3", "v3".to_string());

        store.get("k1");
        store.put("k4", "v4".to_string());

        assert!(store.contains("k1"));
        assert!(!store.contains("k2"));
        assert_eq!(keys(&store), vec!["k4", "k1", "k3"]);
    }

    #[test]
    fn test_eviction_callback_order() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let mut store = BoundedStore::with_eviction_callback(12, move |key, _value: String| {
            sink.lock().unwrap().push(key);
        });

        store.put("key1", "ab".to_string());
        assert_eq!(store.used_bytes(), 6);
        store.put("key2", "value2".to_string());
        store.put("key3", "value3".to_string());

        assert_eq!(*evicted.lock().unwrap(), vec!["key1", "key2"]);
    }

    #[test]
    fn test_oversized_entry_leaves_store_empty() {
        let mut store = BoundedStore::new(4);
        store.put("k1", "v1".to_string());
        store.put("big", "0123456789".to_string());

        assert!(store.is_empty());
        assert_eq!(store.used_bytes(), 0);
    }

    #[test]
    fn test_unlimited_budget_never_evicts() {
        let mut store = BoundedStore::new(0);
        for i in 0..1000 {
            store.put(format!("key-{i}"), "x".repeat(64));
        }
        assert_eq!(store.len(), 1000);
    }

    #[test]
    fn test_slots_are_reused_after_eviction() {
        let mut store = BoundedStore::new(8);
        for i in 0..100 {
            store.put(format!("k{}", i % 10), "vv".to_string());
        }
        assert!(store.slots.len() <= 3);
        assert!(store.used_bytes() <= 8);
    }

    #[test]
    fn test_sole_entry_get_keeps_it_as_candidate() {
        let mut store = BoundedStore::new(4);
        store.put("k1", "v1".to_string());
        store.get("k1");
        store.put("k2", "v2".to_string());

        assert!(!store.contains("k1"));
        assert!(store.contains("k2"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Put(u8, usize),
            Get(u8),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..16, 0usize..24).prop_map(|(k, n)| Op::Put(k, n)),
                (0u8..16).prop_map(Op::Get),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn prop_budget_and_accounting_hold(
                max_bytes in 1usize..64,
                ops in prop::collection::vec(op_strategy(), 1..200),
            ) {
                let mut store = BoundedStore::new(max_bytes);
                for op in ops {
                    match op {
                        Op::Put(k, n) => store.put(format!("k{k}"), "x".repeat(n)),
                        Op::Get(k) => {
                            store.get(&format!("k{k}"));
                        }
                    }

                    let live: usize = store.iter().map(|(k, v)| k.len() + v.len()).sum();
                    prop_assert_eq!(live, store.used_bytes());
                    prop_assert!(store.used_bytes() <= max_bytes);
                    prop_assert_eq!(store.iter().count(), store.len());
                }
            }
        }
    }
}
