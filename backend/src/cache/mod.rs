//! Keyed snapshot cache.
//!
//! Snapshots are JSON values stored under a string key with a time to live.
//! Two access patterns sit on top of the [`SnapshotCache`] port:
//!
//! - [`get_or_compute`] - read-through; `compute` only runs on a miss
//! - [`compute_and_store`] - always recompute and overwrite
//!
//! In both, a failing `compute` leaves the stored entry as it was.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Expiry used when `now + ttl` does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Storage for cached snapshots.
pub trait SnapshotCache: Send + Sync {
    /// The live value under `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: Value, ttl: Duration);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local [`SnapshotCache`].
///
/// Expired entries are dropped on the next read of their key, and every write
/// sweeps out all expired entries. A poisoned lock makes reads miss and writes
/// no-ops.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

impl SnapshotCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        {
            let entries = self.entries.read().ok()?;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: evict, unless another writer refreshed it meanwhile.
        if let Ok(mut entries) = self.entries.write() {
            if entries.get(key).is_some_and(|e| !e.is_live(now)) {
                entries.remove(key);
            }
        }
        None
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        let Ok(mut entries) = self.entries.write() else {
            warn!(key, "cache lock poisoned, skipping write");
            return;
        };

        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));

        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        entries.insert(key.to_string(), CacheEntry { value, expires_at });
    }
}

/// Return the cached value under `key`, computing and storing it on a miss.
pub fn get_or_compute<E, F>(
    cache: &dyn SnapshotCache,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<Value, E>
where
    F: FnOnce() -> Result<Value, E>,
{
    if let Some(value) = cache.get(key) {
        debug!(key, "snapshot cache hit");
        return Ok(value);
    }

    debug!(key, "snapshot cache miss");
    let value = compute()?;
    cache.set(key, value.clone(), ttl);
    Ok(value)
}

/// Compute a fresh value and store it under `key`, whatever is cached.
pub fn compute_and_store<E, F>(
    cache: &dyn SnapshotCache,
    key: &str,
    ttl: Duration,
    compute: F,
) -> Result<Value, E>
where
    F: FnOnce() -> Result<Value, E>,
{
    let value = compute()?;
    cache.set(key, value.clone(), ttl);
    debug!(key, ttl_secs = ttl.as_secs(), "snapshot refreshed");
    Ok(value)
}
