//! Group Registry
//!
//! Lookup table from group name to [`Group`], owned by the application and
//! handed to the peer server. Every group registered in one registry shares
//! its request coalescer; loads are keyed by `(group, key)` so namespaces
//! never collide.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::getter::Getter;
use super::namespace::{Group, GroupBuilder, SharedCoalescer};
use crate::error::Result;

/// Name-indexed set of groups
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
    loader: SharedCoalescer,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register a group, replacing any group of the same name
    pub fn register(&self, builder: GroupBuilder) -> Result<Arc<Group>> {
        let builder = if builder.has_coalescer() {
            builder
        } else {
            builder.coalescer(Arc::clone(&self.loader))
        };
        let group = Arc::new(builder.build()?);
        self.insert(Arc::clone(&group));
        Ok(group)
    }

    /// Register a group with the default policy
    pub fn new_group(
        &self,
        name: impl Into<String>,
        cache_bytes: usize,
        getter: impl Getter + 'static,
    ) -> Arc<Group> {
        let group = Arc::new(Group::new(
            name.into(),
            cache_bytes,
            Arc::new(getter),
            Default::default(),
            Arc::new(super::clock::SystemClock),
            Arc::clone(&self.loader),
        ));
        self.insert(Arc::clone(&group));
        group
    }

    fn insert(&self, group: Arc<Group>) {
        let name = group.name().to_string();
        if self.groups.write().insert(name.clone(), group).is_some() {
            warn!(group = %name, "replaced existing group");
        } else {
            info!(group = %name, "registered group");
        }
    }

    /// Look up a group by name
    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Registered group names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// All registered groups
    pub fn groups(&self) -> Vec<Arc<Group>> {
        self.groups.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
