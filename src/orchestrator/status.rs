use crate::resilience::RateLimitStatus;
use crate::telemetry::Metrics;
use serde::Serialize;

/// Cache view for dashboards.
///
/// `hit_rate` is the share of all requests answered from the cache, matching
/// [`Metrics::cache_hit_rate`]; `hits`/`misses` are raw lookup counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSummary {
    pub enabled: bool,
    pub backend: &'static str,
    pub size: usize,
    pub hit_rate: f64,
    pub hits: u64,
    pub misses: u64,
    pub purged: u64,
}

/// Facts-only snapshot of the orchestrator, suitable for a status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorStatus {
    pub metrics: Metrics,
    pub rate_limit: RateLimitStatus,
    pub cache: CacheSummary,
    pub queued_calls: usize,
}
