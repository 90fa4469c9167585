use std::collections::HashMap;

use serde::Serialize;

use crate::ActiveKey;

/// Per-key result map with a hard memory bound.
///
/// Inserting a new key into a map that already holds `threshold` entries
/// replaces the whole map with just the incoming entry. Older keys become
/// cache misses and force a refetch; the size never exceeds the threshold.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BoundedCache<T> {
    entries: HashMap<ActiveKey, T>,
}

// not derived: the derive would demand T: Default
impl<T> Default for BoundedCache<T> {
    fn default() -> Self {
        BoundedCache {
            entries: HashMap::new(),
        }
    }
}

impl<T> BoundedCache<T> {
    /// Insert under `key`, collapsing the map to this single entry when it
    /// is already at `threshold` distinct keys.
    pub fn insert(&mut self, threshold: usize, key: ActiveKey, value: T) {
        if self.entries.len() >= threshold.max(1) && !self.entries.contains_key(&key) {
            self.entries.clear();
        }
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &ActiveKey) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &ActiveKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ActiveKey, &T)> {
        self.entries.iter()
    }
}
