//! # ai-lib-orchestrator
//!
//! 推理 API 调用编排层：准入控制、响应缓存、重试、排队以及健康/指标聚合。
//!
//! Orchestration core for a metered inference API. Every capability service
//! (scoring, analysis, generation, ...) routes its calls through one
//! [`Orchestrator`], which owns the shared request/token budget, a response
//! cache, the retry policy, a FIFO queue for over-budget calls, and the
//! metrics and health view of the whole thing.
//!
//! ## Core Philosophy
//!
//! - **Opaque operations**: a call is a named async closure plus a parameter bag;
//!   the core never inspects what the closure does
//! - **Budget first**: nothing reaches the API unless the current window admits it
//! - **No silent failures**: terminal errors always reach the caller and are
//!   also recorded as the last error
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_lib_orchestrator::{CallSpec, Orchestrator, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> ai_lib_orchestrator::Result<()> {
//!     let orchestrator = Orchestrator::new(
//!         OrchestratorConfig::new()
//!             .with_api_key("your-api-key")
//!             .with_requests_per_window(60),
//!     )?;
//!
//!     let spec = CallSpec::new("scoring", "score_lead")
//!         .with_cache_params(serde_json::json!({"lead_id": 42}))
//!         .with_estimated_tokens(800);
//!     let score: u32 = orchestrator.call(spec, || async { Ok(87) }).await?;
//!     println!("score = {score}");
//!
//!     orchestrator.destroy().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`orchestrator`] | The invocation surface and its lifecycle |
//! | [`resilience`] | Fixed-window rate limiter and retry executor |
//! | [`cache`] | Fingerprinted response cache with TTL |
//! | [`queue`] | FIFO queue for calls refused by the limiter |
//! | [`telemetry`] | Metrics, health checks and tracing setup |
//! | [`config`] | Configuration from code, environment or YAML |

pub mod cache;
pub mod config;
pub mod error_code;
pub mod orchestrator;
pub mod queue;
pub mod resilience;
pub mod telemetry;

// Re-export main types for convenience
pub use config::{ApiKey, MonitoringConfig, OrchestratorConfig};
pub use error_code::StandardErrorCode;
pub use orchestrator::{
    global, init_global, CacheSummary, CallSpec, Orchestrator, OrchestratorBuilder,
    OrchestratorStatus,
};
pub use telemetry::{HealthReport, HealthStatus, Metrics};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
