//! Process-wide response cache with per-entry TTL.
//!
//! Correctness never depends on sweep timing: `get` itself treats an expired
//! entry as absent. Values are cloned on read and write so a caller mutating
//! a returned value cannot corrupt the stored copy.

use crate::error::CacheError;
use crate::json::{Object, Value};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A key→value store for resolved field values.
///
/// The seam exists so the store can be swapped (or broken, in tests); callers
/// recover from any [`CacheError`] by treating the access as a miss.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;
    fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// The in-memory cache. Concurrent reads and writes are safe; a race between
/// two requests computing the same key resolves as last-write-wins.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a background task reclaiming expired entries every `period`.
    /// Purely a memory-reclamation aid; `get` filters expired entries on its
    /// own.
    pub fn spawn_sweeper(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let entries = Arc::clone(&self.entries);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let now = Instant::now();
                let before = entries.len();
                entries.retain(|_, entry| entry.expires_at > now);
                let reclaimed = before.saturating_sub(entries.len());
                if reclaimed > 0 {
                    tracing::debug!(reclaimed, "swept expired cache entries");
                }
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl CacheBackend for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        // the read guard must be dropped before `remove` wants the shard's
        // write lock
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

/// Derives the cache key for a field resolution:
/// `hash(resource) ":" hash(args)`, extended with `":" principal_id` when
/// the field's hint is private-scoped.
pub fn cache_key(resource: &str, args: &Object, private_id: Option<&str>) -> String {
    let args_bytes =
        serde_json::to_vec(args).expect("a JSON object always serializes; qed");
    let mut key = format!("{}:{}", hash(resource.as_bytes()), hash(&args_bytes));
    if let Some(id) = private_id {
        key.push(':');
        key.push_str(id);
    }
    key
}

fn hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
