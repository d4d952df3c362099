//! Health evaluation.

use super::metrics::Metrics;
use crate::config::ApiKey;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Live reachability check against the inference API.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// `GET <base_url><probe_path>` with bearer credentials; any 2xx counts as reachable.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    api_key: ApiKey,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self) -> Result<()> {
        let mut req = self.client.get(&self.url);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(self.api_key.expose());
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::remote(status.as_u16(), body))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Used when no API base URL is configured; always passes.
pub struct SkippedProbe;

#[async_trait]
impl HealthProbe for SkippedProbe {
    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "skipped"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthThresholds {
    pub max_error_rate: f64,
    pub max_average_response_time_ms: f64,
    /// Minimum share of passing checks for `Degraded` rather than `Unhealthy`.
    pub degraded_ratio: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            max_error_rate: 0.1,
            max_average_response_time_ms: 5000.0,
            degraded_ratio: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthDetails {
    pub api_reachable: bool,
    pub probe: &'static str,
    pub probe_error: Option<String>,
    pub not_rate_limited: bool,
    pub error_rate_ok: bool,
    pub response_time_ok: bool,
    pub checks_passed: u32,
    pub checks_total: u32,
    pub error_rate: f64,
    pub average_response_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub details: HealthDetails,
}

pub fn classify(passed: u32, total: u32, thresholds: &HealthThresholds) -> HealthStatus {
    if total == 0 || passed == total {
        HealthStatus::Healthy
    } else if passed as f64 / total as f64 >= thresholds.degraded_ratio {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}

/// Run the four checks. The probe is bounded by `probe_timeout`.
pub async fn evaluate(
    probe: &dyn HealthProbe,
    probe_timeout: Duration,
    rate_limited: bool,
    metrics: &Metrics,
    thresholds: &HealthThresholds,
) -> HealthReport {
    let probe_result = match tokio::time::timeout(probe_timeout, probe.probe()).await {
        Ok(r) => r,
        Err(_) => Err(Error::Timeout { after: probe_timeout }),
    };
    let probe_error = probe_result.err().map(|e| e.to_string());

    let api_reachable = probe_error.is_none();
    let not_rate_limited = !rate_limited;
    let error_rate_ok = metrics.error_rate < thresholds.max_error_rate;
    let response_time_ok = metrics.average_response_time_ms < thresholds.max_average_response_time_ms;

    let checks = [api_reachable, not_rate_limited, error_rate_ok, response_time_ok];
    let checks_total = checks.len() as u32;
    let checks_passed = checks.iter().filter(|ok| **ok).count() as u32;

    HealthReport {
        status: classify(checks_passed, checks_total, thresholds),
        details: HealthDetails {
            api_reachable,
            probe: probe.name(),
            probe_error,
            not_rate_limited,
            error_rate_ok,
            response_time_ok,
            checks_passed,
            checks_total,
            error_rate: metrics.error_rate,
            average_response_time_ms: metrics.average_response_time_ms,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProbe;

    #[async_trait]
    impl HealthProbe for FailingProbe {
        async fn probe(&self) -> Result<()> {
            Err(Error::remote(503, "down"))
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl HealthProbe for HangingProbe {
        async fn probe(&self) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        fn name(&self) -> &'static str {
            "hanging"
        }
    }

    #[test]
    fn test_classify() {
        let t = HealthThresholds::default();
        assert_eq!(classify(4, 4, &t), HealthStatus::Healthy);
        assert_eq!(classify(3, 4, &t), HealthStatus::Degraded);
        assert_eq!(classify(2, 4, &t), HealthStatus::Unhealthy);
        assert_eq!(classify(0, 4, &t), HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_high_error_rate_is_degraded() {
        let metrics = Metrics {
            total_requests: 10,
            failed_requests: 2,
            successful_requests: 8,
            error_rate: 0.2,
            ..Metrics::default()
        };
        let report = evaluate(
            &SkippedProbe,
            Duration::from_secs(1),
            false,
            &metrics,
            &HealthThresholds::default(),
        )
        .await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.details.checks_passed, 3);
        assert!(!report.details.error_rate_ok);
    }

    #[tokio::test]
    async fn test_unreachable_and_limited_is_unhealthy() {
        let report = evaluate(
            &FailingProbe,
            Duration::from_secs(1),
            true,
            &Metrics::default(),
            &HealthThresholds::default(),
        )
        .await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.details.probe_error.unwrap().contains("503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_probe_times_out() {
        let report = evaluate(
            &HangingProbe,
            Duration::from_secs(2),
            false,
            &Metrics::default(),
            &HealthThresholds::default(),
        )
        .await;
        assert!(!report.details.api_reachable);
        assert_eq!(report.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }
}
