//! Unbounded concurrent cache storage

use std::sync::Arc;

use dashmap::DashMap;

use crate::resolver::{CacheKey, CachedResult};
use crate::storage::CacheStorage;

/// The default storage: an unbounded concurrent map that keeps every
/// record until it is removed or the cache is cleared.
#[derive(Debug, Default)]
pub struct StrongCacheStorage {
    entries: DashMap<CacheKey, Arc<CachedResult>>,
}

impl StrongCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for StrongCacheStorage {
    fn get(&self, key: &CacheKey) -> Option<Arc<CachedResult>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn put(&self, key: CacheKey, value: Arc<CachedResult>) {
        self.entries.insert(key, value);
    }

    fn remove(&self, key: &CacheKey) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn size(&self) -> Option<usize> {
        Some(self.entries.len())
    }

    fn is_concurrent(&self) -> bool {
        true
    }
}
