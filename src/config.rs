//! 编排层配置：凭据、重试上限、超时、限流窗口、缓存与监控设置。
//!
//! Orchestrator configuration.
//!
//! Settings can be assembled three ways:
//! - builder-style `with_*` setters on top of [`OrchestratorConfig::default`]
//! - environment variables via [`OrchestratorConfig::from_env`]
//! - a YAML document via [`OrchestratorConfig::from_yaml_str`] / [`OrchestratorConfig::from_file`]
//!
//! The configuration is validated once when the orchestrator is built and is
//! immutable afterwards.

use crate::cache::CacheConfig;
use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Length of the accounting window used by the rate limiter.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// API credential. The value never appears in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "ApiKey(<unset>)")
        } else {
            write!(f, "ApiKey(<redacted>)")
        }
    }
}

/// Logging and monitoring verbosity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringConfig {
    /// Emit per-call events. Warnings are always emitted.
    pub enabled: bool,
    /// Default filter directive when `RUST_LOG` is not set (e.g. "info", "debug").
    pub log_level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
        }
    }
}

/// Immutable settings for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub api_key: ApiKey,
    /// Base URL of the inference API, used by the health probe.
    pub api_base_url: Option<String>,
    /// Path appended to `api_base_url` for the reachability probe.
    pub probe_path: String,
    /// Total attempts per call (a value of 0 still makes one attempt).
    pub max_retries: u32,
    /// Upper bound for a single attempt.
    pub timeout: Duration,
    pub requests_per_window: u64,
    pub tokens_per_window: u64,
    pub window: Duration,
    /// First backoff delay; attempt `n` waits `retry_base_delay * 2^n`.
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// How often the drain loop re-checks a limited window.
    pub queue_poll_interval: Duration,
    /// Background window re-evaluation interval.
    pub window_check_interval: Duration,
    /// Background cache sweep interval.
    pub cache_sweep_interval: Duration,
    pub health_probe_timeout: Duration,
    pub cache: CacheConfig,
    pub monitoring: MonitoringConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            api_base_url: None,
            probe_path: "/v1/models".to_string(),
            max_retries: 3,
            timeout: Duration::from_secs(30),
            requests_per_window: 60,
            tokens_per_window: 50_000,
            window: DEFAULT_WINDOW,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            queue_poll_interval: Duration::from_secs(1),
            window_check_interval: Duration::from_secs(10),
            cache_sweep_interval: Duration::from_secs(60),
            health_probe_timeout: Duration::from_secs(5),
            cache: CacheConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = ApiKey::new(key);
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn with_probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_path = path.into();
        self
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_requests_per_window(mut self, n: u64) -> Self {
        self.requests_per_window = n;
        self
    }

    pub fn with_tokens_per_window(mut self, n: u64) -> Self {
        self.tokens_per_window = n;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
    }

    pub fn with_queue_poll_interval(mut self, interval: Duration) -> Self {
        self.queue_poll_interval = interval;
        self
    }

    pub fn with_health_probe_timeout(mut self, timeout: Duration) -> Self {
        self.health_probe_timeout = timeout;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_monitoring(mut self, enabled: bool, log_level: impl Into<String>) -> Self {
        self.monitoring = MonitoringConfig {
            enabled,
            log_level: log_level.into(),
        };
        self
    }

    /// Load settings from `AI_LIB_*` environment variables, falling back to defaults.
    ///
    /// - `AI_LIB_API_KEY`, `AI_LIB_API_BASE_URL`, `AI_LIB_PROBE_PATH`
    /// - `AI_LIB_MAX_RETRIES` (default 3)
    /// - `AI_LIB_TIMEOUT_SECS` (default 30)
    /// - `AI_LIB_RPM` (default 60), `AI_LIB_TPM` (default 50000)
    /// - `AI_LIB_CACHE_ENABLED` (default true), `AI_LIB_CACHE_TTL_SECS` (default 300)
    /// - `AI_LIB_MONITORING_ENABLED` (default true), `AI_LIB_LOG_LEVEL` (default "info")
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(key) = lookup("AI_LIB_API_KEY") {
            cfg.api_key = ApiKey::new(key);
        }
        if let Some(url) = lookup("AI_LIB_API_BASE_URL") {
            cfg.api_base_url = Some(url);
        }
        if let Some(path) = lookup("AI_LIB_PROBE_PATH") {
            cfg.probe_path = path;
        }
        if let Some(n) = parse_var::<u32>(&lookup, "AI_LIB_MAX_RETRIES")? {
            cfg.max_retries = n;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "AI_LIB_TIMEOUT_SECS")? {
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<u64>(&lookup, "AI_LIB_RPM")? {
            cfg.requests_per_window = n;
        }
        if let Some(n) = parse_var::<u64>(&lookup, "AI_LIB_TPM")? {
            cfg.tokens_per_window = n;
        }
        if let Some(enabled) = parse_var::<bool>(&lookup, "AI_LIB_CACHE_ENABLED")? {
            cfg.cache.enabled = enabled;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "AI_LIB_CACHE_TTL_SECS")? {
            cfg.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(enabled) = parse_var::<bool>(&lookup, "AI_LIB_MONITORING_ENABLED")? {
            cfg.monitoring.enabled = enabled;
        }
        if let Some(level) = lookup("AI_LIB_LOG_LEVEL") {
            cfg.monitoring.log_level = level;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        let cfg = file.into_config();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Check ranges and the base URL.
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_window == 0 {
            return Err(invalid("requests_per_window", "must be greater than zero"));
        }
        if self.tokens_per_window == 0 {
            return Err(invalid("tokens_per_window", "must be greater than zero"));
        }
        if self.window.is_zero() {
            return Err(invalid("window", "must be a non-zero duration"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("timeout", "must be a non-zero duration"));
        }
        if self.queue_poll_interval.is_zero() {
            return Err(invalid("queue_poll_interval", "must be a non-zero duration"));
        }
        if self.window_check_interval.is_zero() || self.cache_sweep_interval.is_zero() {
            return Err(invalid("maintenance_interval", "must be a non-zero duration"));
        }
        if self.cache.enabled && self.cache.ttl.is_zero() {
            return Err(invalid("cache.ttl", "must be a non-zero duration when caching is enabled"));
        }
        if let Some(ref base) = self.api_base_url {
            url::Url::parse(base).map_err(|e| {
                Error::configuration_with_context(
                    "invalid API base URL",
                    ErrorContext::new()
                        .with_field_path("api_base_url")
                        .with_details(e.to_string())
                        .with_source("config"),
                )
            })?;
        }
        Ok(())
    }

    /// Full probe URL, if a base URL is configured.
    pub fn probe_url(&self) -> Option<String> {
        let base = self.api_base_url.as_ref()?;
        Some(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            self.probe_path.trim_start_matches('/')
        ))
    }
}

fn invalid(field: &str, details: &str) -> Error {
    Error::configuration_with_context(
        format!("invalid value for {}", field),
        ErrorContext::new()
            .with_field_path(field)
            .with_details(details)
            .with_source("config"),
    )
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            Error::configuration_with_context(
                format!("could not parse {}", name),
                ErrorContext::new()
                    .with_field_path(name)
                    .with_details(format!("{:?}: {}", raw, e))
                    .with_source("env"),
            )
        }),
    }
}

/// On-disk representation; durations are expressed in seconds or milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    api_key: Option<String>,
    api_base_url: Option<String>,
    probe_path: Option<String>,
    max_retries: Option<u32>,
    timeout_secs: Option<u64>,
    requests_per_minute: Option<u64>,
    tokens_per_minute: Option<u64>,
    window_secs: Option<u64>,
    retry_base_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    queue_poll_interval_ms: Option<u64>,
    health_probe_timeout_ms: Option<u64>,
    cache: Option<CacheFile>,
    monitoring: Option<MonitoringFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CacheFile {
    enabled: Option<bool>,
    ttl_secs: Option<u64>,
    max_entries: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MonitoringFile {
    enabled: Option<bool>,
    log_level: Option<String>,
}

impl ConfigFile {
    fn into_config(self) -> OrchestratorConfig {
        let mut cfg = OrchestratorConfig::default();
        if let Some(key) = self.api_key {
            cfg.api_key = ApiKey::new(key);
        }
        cfg.api_base_url = self.api_base_url;
        if let Some(path) = self.probe_path {
            cfg.probe_path = path;
        }
        if let Some(n) = self.max_retries {
            cfg.max_retries = n;
        }
        if let Some(secs) = self.timeout_secs {
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.requests_per_minute {
            cfg.requests_per_window = n;
        }
        if let Some(n) = self.tokens_per_minute {
            cfg.tokens_per_window = n;
        }
        if let Some(secs) = self.window_secs {
            cfg.window = Duration::from_secs(secs);
        }
        if let Some(ms) = self.retry_base_delay_ms {
            cfg.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.retry_max_delay_ms {
            cfg.retry_max_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.queue_poll_interval_ms {
            cfg.queue_poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.health_probe_timeout_ms {
            cfg.health_probe_timeout = Duration::from_millis(ms);
        }
        if let Some(cache) = self.cache {
            if let Some(enabled) = cache.enabled {
                cfg.cache.enabled = enabled;
            }
            if let Some(secs) = cache.ttl_secs {
                cfg.cache.ttl = Duration::from_secs(secs);
            }
            if let Some(n) = cache.max_entries {
                cfg.cache.max_entries = n;
            }
        }
        if let Some(mon) = self.monitoring {
            if let Some(enabled) = mon.enabled {
                cfg.monitoring.enabled = enabled;
            }
            if let Some(level) = mon.log_level {
                cfg.monitoring.log_level = level;
            }
        }
        cfg
    }
}
