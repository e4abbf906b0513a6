//! Pluggable cache storage
//!
//! The resolution engine keeps its memoized records in a [`CacheStorage`],
//! a plain key-value surface with deliberately weak guarantees: `get` after
//! `put` may miss (eviction is always allowed), and no atomicity is
//! required across operations. The engine is written so that losing an
//! entry only costs a redundant backing-store check, never correctness.
//!
//! A storage advertises thread safety through
//! [`is_concurrent`](CacheStorage::is_concurrent). Storages that return
//! `false` get wrapped in a [`SynchronizedCacheStorage`] by the engine, so
//! single-threaded implementations stay trivial to write. The lock covers
//! individual `get`/`put`/`remove`/`clear` calls only; resolutions running
//! against the backing store in between proceed in parallel.
//!
//! Built-in implementations:
//!
//! - [`StrongCacheStorage`]: unbounded concurrent map, the default.
//! - [`WeakCacheStorage`]: entries live only while some caller still
//!   holds the record.
//! - [`MruCacheStorage`]: bounded most-recently-used tier over a
//!   weak overflow tier.
//! - [`NullCacheStorage`]: caching disabled; every lookup goes to the
//!   backing store.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::resolver::{CacheKey, CachedResult};

mod mru;
mod strong;
mod weak;

pub use mru::MruCacheStorage;
pub use strong::StrongCacheStorage;
pub use weak::WeakCacheStorage;

/// Key-value store for memoized resolution records.
pub trait CacheStorage: Send + Sync + fmt::Debug {
    /// Looks up the record for `key`, or `None` on a miss (including
    /// entries the storage chose to evict).
    fn get(&self, key: &CacheKey) -> Option<Arc<CachedResult>>;

    /// Stores or replaces the record for `key`.
    fn put(&self, key: CacheKey, value: Arc<CachedResult>);

    /// Drops the record for `key`, if present.
    fn remove(&self, key: &CacheKey);

    /// Drops every record.
    fn clear(&self);

    /// Number of live records, when the storage can tell cheaply.
    fn size(&self) -> Option<usize> {
        None
    }

    /// Whether the storage itself is safe for concurrent access. When
    /// `false`, the engine wraps the storage in a
    /// [`SynchronizedCacheStorage`].
    fn is_concurrent(&self) -> bool {
        false
    }
}

/// Serializes each access to a non-concurrent storage behind one mutex.
///
/// Only the individual storage call runs under the lock; backing-store
/// probes, content reads, and parsing happen between accesses and are not
/// serialized by it.
#[derive(Debug)]
pub struct SynchronizedCacheStorage {
    inner: Arc<dyn CacheStorage>,
    lock: Mutex<()>,
}

impl SynchronizedCacheStorage {
    pub fn new(inner: Arc<dyn CacheStorage>) -> Self {
        Self { inner, lock: Mutex::new(()) }
    }

    fn locked(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStorage for SynchronizedCacheStorage {
    fn get(&self, key: &CacheKey) -> Option<Arc<CachedResult>> {
        let _guard = self.locked();
        self.inner.get(key)
    }

    fn put(&self, key: CacheKey, value: Arc<CachedResult>) {
        let _guard = self.locked();
        self.inner.put(key, value);
    }

    fn remove(&self, key: &CacheKey) {
        let _guard = self.locked();
        self.inner.remove(key);
    }

    fn clear(&self) {
        let _guard = self.locked();
        self.inner.clear();
    }

    fn size(&self) -> Option<usize> {
        let _guard = self.locked();
        self.inner.size()
    }

    fn is_concurrent(&self) -> bool {
        true
    }
}

/// A storage that stores nothing. Disables memoization entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCacheStorage;

impl CacheStorage for NullCacheStorage {
    fn get(&self, _key: &CacheKey) -> Option<Arc<CachedResult>> {
        None
    }

    fn put(&self, _key: CacheKey, _value: Arc<CachedResult>) {}

    fn remove(&self, _key: &CacheKey) {}

    fn clear(&self) {}

    fn size(&self) -> Option<usize> {
        Some(0)
    }

    fn is_concurrent(&self) -> bool {
        true
    }
}
