use crate::cache::{CacheKey, CacheKeyGenerator, CacheManager};
use crate::config::OrchestratorConfig;
use crate::queue::RequestQueue;
use crate::resilience::{RateLimitStatus, RateLimiter, RetryExecutor};
use crate::telemetry::{self, HealthProbe, HealthReport, HealthThresholds, Metrics, MetricsCollector};
use crate::{Error, Result};
use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::builder::OrchestratorBuilder;
use super::call::CallSpec;
use super::status::{CacheSummary, OrchestratorStatus};

pub(crate) struct Inner {
    pub(crate) config: OrchestratorConfig,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) cache: CacheManager,
    pub(crate) retry: RetryExecutor,
    pub(crate) queue: Arc<RequestQueue>,
    pub(crate) metrics: MetricsCollector,
    pub(crate) keygen: CacheKeyGenerator,
    pub(crate) probe: Arc<dyn HealthProbe>,
    pub(crate) thresholds: HealthThresholds,
    pub(crate) shutdown: CancellationToken,
    pub(crate) destroyed: AtomicBool,
}

/// Mediates every call to the inference API.
///
/// Cheap to clone; clones share one budget, cache, queue and set of metrics.
/// Construct one per process at startup and pass it to the capability services.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Build with default probe and thresholds. Must be called inside a Tokio runtime.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        OrchestratorBuilder::new().config(config).build()
    }

    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Run `op` under cache, budget and retry policy.
    ///
    /// - A fresh cached result is returned without touching the budget.
    /// - Otherwise the call runs now if the window admits its estimated cost, or
    ///   waits in the FIFO queue until it does.
    /// - `op` may be invoked several times; transient failures are retried.
    ///
    /// Terminal failures are returned to the caller and recorded as the last error.
    pub async fn call<T, F, Fut>(&self, spec: CallSpec, op: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let inner = &self.inner;
        let started = Instant::now();
        if inner.is_destroyed() {
            return Err(Error::ShuttingDown);
        }
        let call_id = Uuid::new_v4().to_string();

        let key = inner.cache_key(&spec);
        if let Some(ref key) = key {
            match inner.cache.get::<T>(key).await {
                Ok(Some(value)) => {
                    inner.metrics.record_cache_hit(started);
                    if inner.config.monitoring.enabled {
                        debug!(
                            call_id = call_id.as_str(),
                            service = spec.service.as_str(),
                            method = spec.method.as_str(),
                            "cache hit"
                        );
                    }
                    return Ok(value);
                }
                Ok(None) => {}
                Err(e) => warn!(service = spec.service.as_str(), error = %e, "cache lookup failed"),
            }
        }

        if !inner.limiter.fits_window(spec.estimated_tokens) {
            let err = Error::BudgetExceeded {
                estimated: spec.estimated_tokens,
                budget: inner.config.tokens_per_window,
            };
            inner.metrics.record_outcome(started, false, 0);
            inner.metrics.record_error(&spec.service, &err);
            warn!(
                call_id = call_id.as_str(),
                service = spec.service.as_str(),
                estimated_tokens = spec.estimated_tokens,
                "call can never fit the token budget"
            );
            return Err(err);
        }

        if inner.limiter.admit(spec.estimated_tokens) {
            return inner
                .execute_admitted(&call_id, &spec, key.as_ref(), &op, started)
                .await;
        }

        if inner.config.monitoring.enabled {
            info!(
                call_id = call_id.as_str(),
                service = spec.service.as_str(),
                method = spec.method.as_str(),
                queue_len = inner.queue.len(),
                "rate limited; call queued"
            );
        }

        let weak = Arc::downgrade(&self.inner);
        let cost = spec.estimated_tokens;
        let rx = inner.queue.submit(&inner.limiter, call_id.clone(), cost, move || {
            async move {
                match weak.upgrade() {
                    Some(inner) => {
                        // Latency is measured from admission; queue wait is logged separately.
                        let admitted = Instant::now();
                        inner
                            .execute_admitted(&call_id, &spec, key.as_ref(), &op, admitted)
                            .await
                    }
                    None => Err(Error::ShuttingDown),
                }
            }
            .boxed()
        });
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::ShuttingDown),
        }
    }

    /// Drop any cached result for `spec`.
    pub async fn invalidate(&self, spec: &CallSpec) -> Result<bool> {
        match self.inner.cache_key(spec) {
            Some(key) => self.inner.cache.invalidate(&key).await,
            None => Ok(false),
        }
    }

    pub fn metrics(&self) -> Metrics {
        self.inner.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.inner.metrics.reset();
    }

    pub fn rate_limit_status(&self) -> RateLimitStatus {
        self.inner.limiter.snapshot()
    }

    pub async fn cache_stats(&self) -> CacheSummary {
        let size = match self.inner.cache.len().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "cache size unavailable");
                0
            }
        };
        let stats = self.inner.cache.stats();
        CacheSummary {
            enabled: self.inner.cache.is_enabled(),
            backend: self.inner.cache.backend_name(),
            size,
            hit_rate: self.inner.metrics.snapshot().cache_hit_rate,
            hits: stats.hits,
            misses: stats.misses,
            purged: stats.purged,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// Live, point-in-time health verdict. Performs a bounded probe call.
    pub async fn health_check(&self) -> HealthReport {
        let inner = &self.inner;
        let metrics = inner.metrics.snapshot();
        let report = telemetry::evaluate(
            inner.probe.as_ref(),
            inner.config.health_probe_timeout,
            inner.limiter.is_limited(),
            &metrics,
            &inner.thresholds,
        )
        .await;
        debug!(
            status = ?report.status,
            checks_passed = report.details.checks_passed,
            "health check"
        );
        report
    }

    pub async fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            metrics: self.metrics(),
            rate_limit: self.rate_limit_status(),
            cache: self.cache_stats().await,
            queued_calls: self.queue_len(),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    /// Stop maintenance, clear the cache and reject all queued calls with
    /// [`Error::ShuttingDown`]. Later calls fail with the same error.
    pub async fn destroy(&self) {
        let inner = &self.inner;
        if inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        inner.shutdown.cancel();
        let rejected = inner.queue.close();
        if let Err(e) = inner.cache.clear().await {
            warn!(error = %e, "failed to clear cache during shutdown");
        }
        info!(rejected_calls = rejected, "orchestrator destroyed");
    }
}

impl Inner {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn cache_key(&self, spec: &CallSpec) -> Option<CacheKey> {
        if !spec.cacheable || !self.cache.is_enabled() {
            return None;
        }
        let params = spec.cache_params.as_ref().unwrap_or(&Value::Null);
        Some(self.keygen.generate(&spec.service, &spec.method, params))
    }

    /// Run an admitted call and do the bookkeeping around it.
    ///
    /// The limiter reservation taken at admission is charged on success and
    /// returned on failure, or if this future is dropped mid-call.
    async fn execute_admitted<T, F, Fut>(
        &self,
        call_id: &str,
        spec: &CallSpec,
        key: Option<&CacheKey>,
        op: &F,
        started: Instant,
    ) -> Result<T>
    where
        T: Serialize + Send + Sync,
        F: Fn() -> Fut + Sync,
        Fut: Future<Output = Result<T>> + Send,
    {
        let reservation = Reservation::new(&self.limiter, spec.estimated_tokens);
        match self.retry.execute(op).await {
            Ok(value) => {
                reservation.charge();
                if let Some(key) = key {
                    if let Err(e) = self.cache.put(key, &value).await {
                        warn!(call_id, service = spec.service.as_str(), error = %e, "failed to cache result");
                    }
                }
                self.metrics
                    .record_outcome(started, true, spec.estimated_tokens);
                if self.config.monitoring.enabled {
                    info!(
                        call_id,
                        service = spec.service.as_str(),
                        method = spec.method.as_str(),
                        tokens = spec.estimated_tokens,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "call succeeded"
                    );
                }
                Ok(value)
            }
            Err(err) => {
                self.metrics.record_outcome(started, false, 0);
                self.metrics.record_error(&spec.service, &err);
                warn!(
                    call_id,
                    service = spec.service.as_str(),
                    method = spec.method.as_str(),
                    error_code = err.standard_code().code(),
                    retryable = err.is_retryable(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "call failed"
                );
                Err(err)
            }
        }
    }
}

/// An admitted call's hold on the rate-limit window.
struct Reservation<'a> {
    limiter: &'a RateLimiter,
    cost: u64,
    settled: bool,
}

impl<'a> Reservation<'a> {
    fn new(limiter: &'a RateLimiter, cost: u64) -> Self {
        Self {
            limiter,
            cost,
            settled: false,
        }
    }

    fn charge(mut self) {
        self.limiter.consume(self.cost);
        self.settled = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.limiter.release(self.cost);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.queue.close();
    }
}
