use serde::Serialize;
use serde_json::Value;

use crate::Result;

/// Identity and budget of one capability-service call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSpec {
    /// Capability service name, e.g. "lead_scoring".
    pub service: String,
    /// Operation within the service, e.g. "score".
    pub method: String,
    /// Parameters that determine the result; part of the cache fingerprint.
    pub cache_params: Option<Value>,
    /// Token cost charged against the window once the call succeeds.
    pub estimated_tokens: u64,
    /// When false the result is neither looked up nor stored.
    pub cacheable: bool,
}

impl CallSpec {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            cache_params: None,
            estimated_tokens: 0,
            cacheable: true,
        }
    }

    pub fn with_cache_params(mut self, params: Value) -> Self {
        self.cache_params = Some(params);
        self
    }

    /// Serialize any parameter struct into the cache fingerprint.
    pub fn with_params<P: Serialize>(mut self, params: &P) -> Result<Self> {
        self.cache_params = Some(serde_json::to_value(params)?);
        Ok(self)
    }

    pub fn with_estimated_tokens(mut self, tokens: u64) -> Self {
        self.estimated_tokens = tokens;
        self
    }

    /// Always go to the API, e.g. for generation that must not repeat.
    pub fn no_cache(mut self) -> Self {
        self.cacheable = false;
        self
    }
}
