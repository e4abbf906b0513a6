//! Weakly-referencing cache storage
//!
//! Stores [`Weak`] handles to the records, so an entry stays retrievable
//! only while some caller still holds a strong reference to it (for
//! example through a returned [`Template`](crate::template::Template)
//! whose record the engine keeps alive, or another storage tier). The
//! closest stand-in for a garbage-collector-backed soft-reference cache:
//! memory pressure is bounded by what callers actually keep.
//!
//! Dead handles are dropped lazily: a `get` that finds one removes it, and
//! every `put` sweeps the whole map. The maps here stay small enough in
//! practice (entries disappear as callers drop them) that a full sweep per
//! `put` is cheaper than bookkeeping a drop queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::resolver::{CacheKey, CachedResult};
use crate::storage::CacheStorage;

/// Storage whose entries survive only while externally referenced.
#[derive(Debug, Default)]
pub struct WeakCacheStorage {
    entries: Mutex<HashMap<CacheKey, Weak<CachedResult>>>,
}

impl WeakCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for WeakCacheStorage {
    fn get(&self, key: &CacheKey) -> Option<Arc<CachedResult>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key).and_then(Weak::upgrade) {
            Some(record) => Some(record),
            None => {
                entries.remove(key);
                None
            }
        }
    }

    fn put(&self, key: CacheKey, value: Arc<CachedResult>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, weak| weak.strong_count() > 0);
        entries.insert(key, Arc::downgrade(&value));
    }

    fn remove(&self, key: &CacheKey) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }

    fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    fn size(&self) -> Option<usize> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Some(entries.values().filter(|weak| weak.strong_count() > 0).count())
    }

    fn is_concurrent(&self) -> bool {
        true
    }
}
