//! 遥测模块：调用指标聚合、健康检查与日志初始化。
//!
//! Telemetry: metrics aggregation, health evaluation and tracing setup.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`MetricsCollector`] | Counters, running mean latency, error and cache-hit rates |
//! | [`HealthProbe`] | Live reachability check (HTTP by default) |
//! | [`evaluate`] | Tri-state verdict from four boolean checks |
//! | [`init_tracing`] | Installs a `tracing-subscriber` fmt layer |

mod health;
mod metrics;

pub use health::{
    classify, evaluate, HealthDetails, HealthProbe, HealthReport, HealthStatus, HealthThresholds,
    HttpProbe, SkippedProbe,
};
pub use metrics::{LastError, Metrics, MetricsCollector};

use crate::config::MonitoringConfig;
use crate::{Error, ErrorContext, Result};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level is used. Fails if a
/// subscriber is already installed.
pub fn init_tracing(cfg: &MonitoringConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.log_level).map_err(|e| {
            Error::configuration_with_context(
                "invalid log level",
                ErrorContext::new()
                    .with_field_path("monitoring.log_level")
                    .with_details(e.to_string())
                    .with_source("telemetry"),
            )
        })?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| {
            Error::runtime_with_context(
                "tracing subscriber already installed",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("telemetry"),
            )
        })
}
