//! 弹性模式模块：提供固定窗口限流和带指数退避的重试执行器。
//!
//! # Resilience Primitives Module
//!
//! The two primitives the orchestrator wraps around every live call.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Fixed-window request and token budget |
//! | [`retry`] | Bounded retries with exponential backoff and timeouts |
//!
//! ## Rate Limiter
//!
//! ```rust
//! use ai_lib_orchestrator::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
//!
//! let limiter = RateLimiter::new(
//!     RateLimiterConfig::new()
//!         .with_requests_per_window(2)
//!         .with_tokens_per_window(10_000),
//! );
//!
//! if limiter.admit(100) {
//!     // Make the call, then charge it
//!     limiter.consume(100);
//! }
//! ```
//!
//! ## Retry Executor
//!
//! ```rust
//! use ai_lib_orchestrator::resilience::retry::{RetryConfig, RetryExecutor};
//!
//! # tokio_test::block_on(async {
//! let executor = RetryExecutor::new(RetryConfig::new().with_max_attempts(3));
//! let answer = executor.execute(|| async { Ok::<_, ai_lib_orchestrator::Error>(42) }).await;
//! assert_eq!(answer.unwrap(), 42);
//! # });
//! ```

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{RateLimitStatus, RateLimiter, RateLimiterConfig};
pub use retry::{Decision, RetryConfig, RetryExecutor};
