use crate::cache::{CacheBackend, CacheKeyGenerator, CacheManager};
use crate::config::OrchestratorConfig;
use crate::orchestrator::core::{Inner, Orchestrator};
use crate::queue::RequestQueue;
use crate::resilience::{RateLimiter, RateLimiterConfig, RetryConfig, RetryExecutor};
use crate::telemetry::{HealthProbe, HealthThresholds, HttpProbe, MetricsCollector, SkippedProbe};
use crate::{Error, ErrorContext, Result};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Builder for an [`Orchestrator`].
///
/// Everything not set explicitly is derived from the configuration.
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    probe: Option<Arc<dyn HealthProbe>>,
    thresholds: HealthThresholds,
    cache_backend: Option<Box<dyn CacheBackend>>,
    cache_salt: Option<String>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            probe: None,
            thresholds: HealthThresholds::default(),
            cache_backend: None,
            cache_salt: None,
        }
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the reachability probe used by `health_check`.
    ///
    /// Defaults to an HTTP probe when `api_base_url` is set, otherwise the check is skipped.
    pub fn health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn health_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Store results in a custom backend. Ignored when caching is disabled.
    pub fn cache_backend(mut self, backend: Box<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    /// Namespace cache fingerprints, e.g. by prompt version.
    pub fn cache_salt(mut self, salt: impl Into<String>) -> Self {
        self.cache_salt = Some(salt.into());
        self
    }

    /// Validate the configuration and start background maintenance.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<Orchestrator> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::runtime_with_context(
                "orchestrator must be built inside a Tokio runtime",
                ErrorContext::new().with_source("orchestrator_builder"),
            ));
        }
        let config = self.config;
        config.validate()?;

        let limiter = Arc::new(RateLimiter::new(
            RateLimiterConfig::new()
                .with_requests_per_window(config.requests_per_window)
                .with_tokens_per_window(config.tokens_per_window)
                .with_window(config.window),
        ));

        let retry = RetryExecutor::new(
            RetryConfig::new()
                .with_max_attempts(config.max_retries)
                .with_base_delay(config.retry_base_delay)
                .with_max_delay(config.retry_max_delay)
                .with_attempt_timeout(config.timeout),
        );

        let cache = match self.cache_backend {
            Some(backend) if config.cache.enabled => CacheManager::new(config.cache.clone(), backend),
            _ => CacheManager::from_config(config.cache.clone()),
        };

        let keygen = match self.cache_salt {
            Some(salt) => CacheKeyGenerator::new().with_salt(salt),
            None => CacheKeyGenerator::new(),
        };

        let probe: Arc<dyn HealthProbe> = match (self.probe, config.probe_url()) {
            (Some(probe), _) => probe,
            (None, Some(url)) => Arc::new(HttpProbe::new(url, config.api_key.clone())),
            (None, None) => Arc::new(SkippedProbe),
        };

        if config.monitoring.enabled {
            info!(
                requests_per_window = config.requests_per_window,
                tokens_per_window = config.tokens_per_window,
                window_secs = config.window.as_secs(),
                max_retries = config.max_retries,
                cache_enabled = config.cache.enabled,
                cache_backend = cache.backend_name(),
                probe = probe.name(),
                "orchestrator started"
            );
        }

        let inner = Arc::new(Inner {
            queue: Arc::new(RequestQueue::new(config.queue_poll_interval)),
            config,
            limiter,
            cache,
            retry,
            metrics: MetricsCollector::new(),
            keygen,
            probe,
            thresholds: self.thresholds,
            shutdown: CancellationToken::new(),
            destroyed: AtomicBool::new(false),
        });
        super::maintenance::spawn(&inner);
        Ok(Orchestrator::from_inner(inner))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
