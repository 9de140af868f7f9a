//! Lazily populated, caller-owned caches for loaded artifacts
//!
//! Entries are loaded on first use and kept until invalidated. The DashMap
//! entry lock is held while a value loads, so concurrent callers asking for
//! the same key wait for the first load instead of repeating it. A failed
//! load leaves the key vacant and the next call retries.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::artifacts::{LoadedModel, ModelArtifacts};
use crate::census::{CensusYear, ReferenceTable};

/// Loaded model configurations keyed by artifact paths
pub type ModelCache = LazyCache<ModelArtifacts, LoadedModel>;

/// Census reference tables keyed by year
pub type ReferenceCache = LazyCache<CensusYear, ReferenceTable>;

/// Thread-safe key → `Arc<V>` map filled on demand
pub struct LazyCache<K, V> {
    entries: DashMap<K, Arc<V>>,
}

impl<K, V> LazyCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Cached value for `key`, running `load` if there is none yet
    pub fn get_or_try_load<E, F>(&self, key: &K, load: F) -> Result<Arc<V>, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.entries.get(key) {
            tracing::debug!("cache hit for {:?}", key);
            return Ok(Arc::clone(&value));
        }

        match self.entries.entry(key.clone()) {
            // Another caller finished loading between the read and the entry lock
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                tracing::debug!("cache miss for {:?}, loading", key);
                let value = Arc::new(load(key)?);
                entry.insert(Arc::clone(&value));
                Ok(value)
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).map(|v| Arc::clone(&v))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop one entry; the next lookup loads it again
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            tracing::debug!("invalidated {:?}", key);
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for LazyCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
