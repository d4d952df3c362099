//! Aggregate call metrics.

use crate::Error;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Most recent terminal failure. Overwritten, never appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastError {
    pub message: String,
    pub service: String,
    /// Unix time in milliseconds.
    pub timestamp_ms: u64,
}

/// Point-in-time copy of the counters.
///
/// `successful_requests + failed_requests <= total_requests`; the difference is
/// cache hits.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub tokens_used: u64,
    /// Running mean over every request, cache hits included.
    pub average_response_time_ms: f64,
    pub error_rate: f64,
    pub cache_hit_rate: f64,
    pub last_error: Option<LastError>,
}

impl Metrics {
    pub fn cache_hits(&self) -> u64 {
        self.total_requests
            .saturating_sub(self.successful_requests + self.failed_requests)
    }

    fn record_request(&mut self, elapsed_ms: f64) {
        self.total_requests += 1;
        let n = self.total_requests as f64;
        self.average_response_time_ms = (self.average_response_time_ms * (n - 1.0) + elapsed_ms) / n;
    }

    fn recompute_rates(&mut self) {
        if self.total_requests == 0 {
            self.error_rate = 0.0;
            self.cache_hit_rate = 0.0;
            return;
        }
        let total = self.total_requests as f64;
        self.error_rate = self.failed_requests as f64 / total;
        self.cache_hit_rate = self.cache_hits() as f64 / total;
    }
}

#[derive(Default)]
pub struct MetricsCollector {
    state: Mutex<Metrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Metrics> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a call that reached the API.
    pub fn record_outcome(&self, started: Instant, success: bool, tokens_used: u64) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut m = self.lock();
        m.record_request(elapsed_ms);
        if success {
            m.successful_requests += 1;
            m.tokens_used = m.tokens_used.saturating_add(tokens_used);
        } else {
            m.failed_requests += 1;
        }
        m.recompute_rates();
    }

    /// Record a call answered from the cache.
    pub fn record_cache_hit(&self, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut m = self.lock();
        m.record_request(elapsed_ms);
        m.recompute_rates();
    }

    pub fn record_error(&self, service: &str, err: &Error) {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.lock().last_error = Some(LastError {
            message: err.to_string(),
            service: service.to_string(),
            timestamp_ms,
        });
    }

    pub fn snapshot(&self) -> Metrics {
        self.lock().clone()
    }

    pub fn reset(&self) {
        *self.lock() = Metrics::default();
    }
}
