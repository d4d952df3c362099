//! Cache manager.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use super::backend::{CacheBackend, MemoryCache, NullCache};
use super::key::CacheKey;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig { pub enabled: bool, pub ttl: Duration, pub max_entries: usize, pub max_entry_size: usize }

impl Default for CacheConfig {
    fn default() -> Self { Self { enabled: true, ttl: Duration::from_secs(300), max_entries: 1000, max_entry_size: 10 * 1024 * 1024 } }
}

impl CacheConfig {
    pub fn new() -> Self { Self::default() }
    pub fn disabled() -> Self { Self { enabled: false, ..Self::default() } }
    pub fn with_ttl(mut self, ttl: Duration) -> Self { self.ttl = ttl; self }
    pub fn with_enabled(mut self, enabled: bool) -> Self { self.enabled = enabled; self }
    pub fn with_max_entries(mut self, n: usize) -> Self { self.max_entries = n; self }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats { pub hits: u64, pub misses: u64, pub sets: u64, pub deletes: u64, pub purged: u64, pub errors: u64 }

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 { let total = self.hits + self.misses; if total == 0 { 0.0 } else { self.hits as f64 / total as f64 } }
}

struct AtomicStats { hits: AtomicU64, misses: AtomicU64, sets: AtomicU64, deletes: AtomicU64, purged: AtomicU64, errors: AtomicU64 }
impl AtomicStats {
    fn new() -> Self { Self { hits: AtomicU64::new(0), misses: AtomicU64::new(0), sets: AtomicU64::new(0), deletes: AtomicU64::new(0), purged: AtomicU64::new(0), errors: AtomicU64::new(0) } }
    fn to_stats(&self) -> CacheStats { CacheStats { hits: self.hits.load(Ordering::Relaxed), misses: self.misses.load(Ordering::Relaxed), sets: self.sets.load(Ordering::Relaxed), deletes: self.deletes.load(Ordering::Relaxed), purged: self.purged.load(Ordering::Relaxed), errors: self.errors.load(Ordering::Relaxed) } }
}

/// Typed front for a [`CacheBackend`]: serializes values, applies the TTL and counts hits.
///
/// When caching is disabled every lookup is a miss and every store is dropped,
/// so callers never branch on the setting.
pub struct CacheManager { config: CacheConfig, backend: Box<dyn CacheBackend>, stats: Arc<AtomicStats> }

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self { Self { config, backend, stats: Arc::new(AtomicStats::new()) } }

    /// Pick the backend the configuration asks for.
    pub fn from_config(config: CacheConfig) -> Self {
        let backend: Box<dyn CacheBackend> = if config.enabled { Box::new(MemoryCache::new(config.max_entries)) } else { Box::new(NullCache::new()) };
        Self::new(config, backend)
    }

    pub fn is_enabled(&self) -> bool { self.config.enabled }
    pub fn config(&self) -> &CacheConfig { &self.config }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        if !self.config.enabled { return Ok(None); }
        match self.backend.get(key).await {
            Ok(Some(data)) => {
                match serde_json::from_slice(&data) {
                    Ok(val) => { self.stats.hits.fetch_add(1, Ordering::Relaxed); Ok(Some(val)) }
                    // An entry written for another type is a miss, not a failure.
                    Err(_) => { self.stats.errors.fetch_add(1, Ordering::Relaxed); self.stats.misses.fetch_add(1, Ordering::Relaxed); Ok(None) }
                }
            }
            Ok(None) => { self.stats.misses.fetch_add(1, Ordering::Relaxed); Ok(None) }
            Err(e) => { self.stats.errors.fetch_add(1, Ordering::Relaxed); Err(e) }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> { self.put_with_ttl(key, value, self.config.ttl).await }

    pub async fn put_with_ttl<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) -> Result<()> {
        if !self.config.enabled { return Ok(()); }
        let data = serde_json::to_vec(value)?;
        if data.len() > self.config.max_entry_size { return Ok(()); }
        match self.backend.set(key, &data, ttl).await { Ok(()) => { self.stats.sets.fetch_add(1, Ordering::Relaxed); Ok(()) } Err(e) => { self.stats.errors.fetch_add(1, Ordering::Relaxed); Err(e) } }
    }

    pub async fn invalidate(&self, key: &CacheKey) -> Result<bool> {
        if !self.config.enabled { return Ok(false); }
        match self.backend.delete(key).await { Ok(d) => { if d { self.stats.deletes.fetch_add(1, Ordering::Relaxed); } Ok(d) } Err(e) => { self.stats.errors.fetch_add(1, Ordering::Relaxed); Err(e) } }
    }

    /// Proactively remove expired entries. Returns the number removed.
    pub async fn sweep(&self) -> Result<usize> {
        let removed = self.backend.purge_expired().await?;
        self.stats.purged.fetch_add(removed as u64, Ordering::Relaxed);
        Ok(removed)
    }

    pub async fn clear(&self) -> Result<()> { self.backend.clear().await }
    pub async fn len(&self) -> Result<usize> { self.backend.len().await }
    pub fn stats(&self) -> CacheStats { self.stats.to_stats() }
    pub fn backend_name(&self) -> &'static str { self.backend.name() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_then_expiry() {
        let cache = CacheManager::from_config(CacheConfig::new().with_ttl(Duration::from_secs(1)));
        let key = CacheKey::new("k");
        cache.put(&key, &"v").await.unwrap();
        assert_eq!(cache.get::<String>(&key).await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(cache.get::<String>(&key).await.unwrap(), None);
        assert_eq!(cache.len().await.unwrap(), 0);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_ratio(), 0.5);
    }

    #[tokio::test]
    async fn test_disabled_cache_reports_absence() {
        let cache = CacheManager::from_config(CacheConfig::disabled());
        let key = CacheKey::new("k");
        cache.put(&key, &json!({"score": 9})).await.unwrap();
        assert_eq!(cache.get::<serde_json::Value>(&key).await.unwrap(), None);
        assert_eq!(cache.backend_name(), "null");
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_miss() {
        let cache = CacheManager::from_config(CacheConfig::default());
        let key = CacheKey::new("k");
        cache.put(&key, &"text").await.unwrap();
        assert_eq!(cache.get::<u32>(&key).await.unwrap(), None);
        assert_eq!(cache.stats().errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_counts_purged() {
        let cache = CacheManager::from_config(CacheConfig::new().with_ttl(Duration::from_secs(1)));
        cache.put(&CacheKey::new("a"), &1).await.unwrap();
        cache.put(&CacheKey::new("b"), &2).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cache.sweep().await.unwrap(), 2);
        assert_eq!(cache.stats().purged, 2);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = CacheManager::from_config(CacheConfig::default());
        let key = CacheKey::new("k");
        cache.put(&key, &1).await.unwrap();
        assert!(cache.invalidate(&key).await.unwrap());
        assert!(!cache.invalidate(&key).await.unwrap());
        assert_eq!(cache.stats().deletes, 1);
    }
}
