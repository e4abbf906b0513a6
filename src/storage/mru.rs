//! Bounded most-recently-used cache storage
//!
//! Two tiers behind one lock. The strong tier holds up to `max_strong`
//! records and keeps them alive; touching a record through `get` or `put`
//! makes it the most recently used. When the strong tier overflows, its
//! least recently used record is demoted to the weak tier, which holds up
//! to `max_weak` [`Weak`] handles: a demoted record stays retrievable
//! while some caller still references it, and a hit there promotes it back
//! into the strong tier.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use lru::LruCache;

use crate::resolver::{CacheKey, CachedResult};
use crate::storage::CacheStorage;

/// Bounded storage that evicts least-recently-used records first.
#[derive(Debug)]
pub struct MruCacheStorage {
    tiers: Mutex<Tiers>,
    max_strong: usize,
    max_weak: usize,
}

#[derive(Debug)]
struct Tiers {
    strong: LruCache<CacheKey, Arc<CachedResult>>,
    weak: LruCache<CacheKey, Weak<CachedResult>>,
}

impl MruCacheStorage {
    /// `max_strong` records are kept alive; up to `max_weak` further
    /// records remain retrievable while externally referenced. Either
    /// bound may be zero to disable that tier.
    pub fn new(max_strong: usize, max_weak: usize) -> Self {
        Self {
            // Caps are enforced manually so that zero is a valid bound;
            // LruCache's own capacity type starts at one.
            tiers: Mutex::new(Tiers {
                strong: LruCache::unbounded(),
                weak: LruCache::unbounded(),
            }),
            max_strong,
            max_weak,
        }
    }

    /// The strong-tier bound.
    pub fn max_strong(&self) -> usize {
        self.max_strong
    }

    /// The weak-tier bound.
    pub fn max_weak(&self) -> usize {
        self.max_weak
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tiers> {
        self.tiers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_strong(&self, tiers: &mut Tiers, key: CacheKey, value: Arc<CachedResult>) {
        tiers.strong.push(key, value);
        while tiers.strong.len() > self.max_strong {
            let Some((demoted_key, demoted)) = tiers.strong.pop_lru() else {
                break;
            };
            if self.max_weak > 0 {
                tiers.weak.push(demoted_key, Arc::downgrade(&demoted));
                while tiers.weak.len() > self.max_weak {
                    tiers.weak.pop_lru();
                }
            }
        }
    }
}

impl CacheStorage for MruCacheStorage {
    fn get(&self, key: &CacheKey) -> Option<Arc<CachedResult>> {
        let mut tiers = self.lock();
        if let Some(record) = tiers.strong.get(key) {
            return Some(Arc::clone(record));
        }
        match tiers.weak.pop(key) {
            Some(weak) => match weak.upgrade() {
                Some(record) => {
                    // Promote back into the strong tier.
                    self.insert_strong(&mut tiers, key.clone(), Arc::clone(&record));
                    Some(record)
                }
                None => None,
            },
            None => None,
        }
    }

    fn put(&self, key: CacheKey, value: Arc<CachedResult>) {
        let mut tiers = self.lock();
        tiers.weak.pop(&key);
        self.insert_strong(&mut tiers, key, value);
    }

    fn remove(&self, key: &CacheKey) {
        let mut tiers = self.lock();
        tiers.strong.pop(key);
        tiers.weak.pop(key);
    }

    fn clear(&self) {
        let mut tiers = self.lock();
        tiers.strong.clear();
        tiers.weak.clear();
    }

    fn size(&self) -> Option<usize> {
        let tiers = self.lock();
        let live_weak = tiers.weak.iter().filter(|(_, weak)| weak.strong_count() > 0).count();
        Some(tiers.strong.len() + live_weak)
    }

    fn is_concurrent(&self) -> bool {
        true
    }
}
