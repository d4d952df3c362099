//! Cache key generation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Request fingerprint: hex SHA-256 of the canonical operation identity and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
    pub service: Option<String>,
    pub method: Option<String>,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into(), service: None, method: None }
    }
    pub fn with_service(mut self, service: impl Into<String>) -> Self { self.service = Some(service.into()); self }
    pub fn with_method(mut self, method: impl Into<String>) -> Self { self.method = Some(method.into()); self }
    pub fn as_str(&self) -> &str { &self.hash }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.hash) }
}

impl From<&str> for CacheKey { fn from(s: &str) -> Self { Self::new(s) } }
impl From<String> for CacheKey { fn from(s: String) -> Self { Self::new(s) } }

/// Derives [`CacheKey`]s so that semantically equal calls share one entry.
///
/// Object keys are sorted recursively before hashing, so `{"a":1,"b":2}` and
/// `{"b":2,"a":1}` produce the same key on every run.
pub struct CacheKeyGenerator {
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self { Self { salt: None } }

    /// Mix a namespace into every key (e.g. a deployment or prompt version).
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self { self.salt = Some(salt.into()); self }

    pub fn generate(&self, service: &str, method: &str, params: &Value) -> CacheKey {
        let mut parts: BTreeMap<&str, Value> = BTreeMap::new();
        parts.insert("service", Value::String(service.to_string()));
        parts.insert("method", Value::String(method.to_string()));
        parts.insert("params", canonicalize(params));
        if let Some(ref s) = self.salt {
            parts.insert("salt", Value::String(s.clone()));
        }
        // Serializing a BTreeMap of Values cannot fail.
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect();
        CacheKey::new(hash).with_service(service).with_method(method)
    }
}

impl Default for CacheKeyGenerator { fn default() -> Self { Self::new() } }

/// Rebuild `value` with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> = map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
