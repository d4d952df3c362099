//! 响应缓存模块：按请求指纹缓存成功结果，减少重复的推理 API 调用。
//!
//! # Response Caching Module
//!
//! Successful results are cached under a deterministic fingerprint of the
//! operation identity and its parameters, so identical recent calls never reach
//! the metered API twice.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | Typed cache front with TTL and statistics |
//! | [`CacheConfig`] | Enablement, TTL and size limits |
//! | [`CacheBackend`] | Trait for storage backends |
//! | [`MemoryCache`] | In-memory map with expiry and LRA eviction |
//! | [`NullCache`] | No-op backend used when caching is disabled |
//! | [`CacheKeyGenerator`] | Fingerprints `(service, method, params)` |
//!
//! ## Expiry
//!
//! An entry whose expiry has passed is treated as absent and removed on lookup.
//! The orchestrator additionally sweeps expired entries in the background so
//! memory stays bounded without read traffic.
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_orchestrator::cache::{CacheConfig, CacheKeyGenerator, CacheManager};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let cache = CacheManager::from_config(CacheConfig::new().with_ttl(Duration::from_secs(300)));
//! let key = CacheKeyGenerator::new().generate("scoring", "score", &serde_json::json!({"lead": 42}));
//!
//! cache.put(&key, &87u32).await.unwrap();
//! assert_eq!(cache.get::<u32>(&key).await.unwrap(), Some(87));
//! # });
//! ```

mod backend;
mod key;
mod manager;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use key::{canonicalize, CacheKey, CacheKeyGenerator};
pub use manager::{CacheConfig, CacheManager, CacheStats};
