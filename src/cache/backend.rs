//! Cache backend implementations.

use super::key::CacheKey;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            data,
            expires_at: now + ttl,
            last_accessed: now,
        }
    }
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    /// Drop every expired entry, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// In-memory map with per-entry expiry and least-recently-accessed eviction.
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
        }
    }

    // A poisoned lock still guards a consistent map: every mutation is a single call.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn evict_if_needed(&self, entries: &mut HashMap<String, CacheEntry>, incoming: &str) {
        if entries.contains_key(incoming) {
            return;
        }
        let now = Instant::now();
        entries.retain(|_, e| !e.is_expired(now));
        while entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                entries.remove(&k);
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let mut entries = self.write();
        let now = Instant::now();
        if let Some(entry) = entries.get_mut(&key.hash) {
            if entry.is_expired(now) {
                entries.remove(&key.hash);
                return Ok(None);
            }
            entry.last_accessed = now;
            return Ok(Some(entry.data.clone()));
        }
        Ok(None)
    }
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        let mut entries = self.write();
        self.evict_if_needed(&mut entries, &key.hash);
        entries.insert(key.hash.clone(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }
    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.write().remove(&key.hash).is_some())
    }
    async fn clear(&self) -> Result<()> {
        self.write().clear();
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        let now = Instant::now();
        Ok(self.read().values().filter(|e| !e.is_expired(now)).count())
    }
    async fn purge_expired(&self) -> Result<usize> {
        let mut entries = self.write();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        Ok(before - entries.len())
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Backend used when caching is disabled: stores nothing, finds nothing.
pub struct NullCache;
impl NullCache {
    pub fn new() -> Self {
        Self
    }
}
impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: &[u8], _: Duration) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_removed_on_lookup() {
        let cache = MemoryCache::new(10);
        let key = CacheKey::new("k");
        cache.set(&key, b"v", Duration::from_secs(1)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert_eq!(cache.entries.read().unwrap().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_exactly_at_ttl() {
        let cache = MemoryCache::new(10);
        let key = CacheKey::new("k");
        cache.set(&key, b"v", Duration::from_secs(2)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCache::new(10);
        cache.set(&CacheKey::new("short"), b"1", Duration::from_secs(1)).await.unwrap();
        cache.set(&CacheKey::new("long"), b"2", Duration::from_secs(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_least_recently_accessed() {
        let cache = MemoryCache::new(2);
        let ttl = Duration::from_secs(60);
        cache.set(&CacheKey::new("a"), b"a", ttl).await.unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.set(&CacheKey::new("b"), b"b", ttl).await.unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.get(&CacheKey::new("a")).await.unwrap();
        cache.set(&CacheKey::new("c"), b"c", ttl).await.unwrap();

        assert!(cache.get(&CacheKey::new("a")).await.unwrap().is_some());
        assert!(cache.get(&CacheKey::new("b")).await.unwrap().is_none());
        assert!(cache.get(&CacheKey::new("c")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let cache = MemoryCache::new(1);
        let key = CacheKey::new("k");
        cache.set(&key, b"1", Duration::from_secs(60)).await.unwrap();
        cache.set(&key, b"2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_null_cache() {
        let cache = NullCache::new();
        let key = CacheKey::new("k");
        cache.set(&key, b"v", Duration::from_secs(60)).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
        assert_eq!(cache.len().await.unwrap(), 0);
    }
}
