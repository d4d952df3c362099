//! Tests for error classification logic

use ai_lib_orchestrator::resilience::{Decision, RetryConfig, RetryExecutor};
use ai_lib_orchestrator::{Error, StandardErrorCode};
use std::time::Duration;

#[test]
fn test_retryable_statuses() {
    // Transient server-side conditions are worth another attempt.
    for status in [408u16, 429, 500, 502, 503, 504, 529] {
        let err = Error::remote(status, "transient");
        assert!(
            err.is_retryable(),
            "HTTP {} should be retryable, classified as {:?}",
            status,
            err.standard_code()
        );
    }
}

#[test]
fn test_client_errors_are_terminal() {
    // Fail on any retry, so propagate immediately.
    for status in [400u16, 401, 403, 404, 413, 422] {
        let err = Error::remote(status, "client");
        assert!(
            !err.is_retryable(),
            "HTTP {} should not be retryable, classified as {:?}",
            status,
            err.standard_code()
        );
    }
}

#[test]
fn test_http_status_mapping() {
    let cases = [
        (400, StandardErrorCode::InvalidRequest),
        (401, StandardErrorCode::Authentication),
        (403, StandardErrorCode::PermissionDenied),
        (408, StandardErrorCode::Timeout),
        (413, StandardErrorCode::RequestTooLarge),
        (429, StandardErrorCode::RateLimited),
        (500, StandardErrorCode::ServerError),
        (503, StandardErrorCode::Overloaded),
        (504, StandardErrorCode::Timeout),
    ];
    for (status, expected) in cases {
        assert_eq!(StandardErrorCode::from_http_status(status), expected, "HTTP {}", status);
    }
}

#[test]
fn test_orchestrator_errors() {
    let budget = Error::BudgetExceeded {
        estimated: 60_000,
        budget: 50_000,
    };
    assert_eq!(budget.standard_code(), StandardErrorCode::BudgetExceeded);
    assert!(!budget.is_retryable());

    assert_eq!(Error::ShuttingDown.standard_code(), StandardErrorCode::ShuttingDown);
    assert!(!Error::ShuttingDown.is_retryable());

    let timeout = Error::Timeout {
        after: Duration::from_secs(30),
    };
    assert!(timeout.is_retryable());
    assert_eq!(timeout.to_string(), "Operation timed out after 30000ms");
}

#[test]
fn test_retry_decisions_follow_classification() {
    let executor = RetryExecutor::new(
        RetryConfig::new()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(30)),
    );
    let transient = Error::remote(503, "busy");
    assert_eq!(
        executor.decide(&transient, 0),
        Decision::Retry {
            delay: Duration::from_secs(1)
        }
    );
    assert_eq!(
        executor.decide(&transient, 1),
        Decision::Retry {
            delay: Duration::from_secs(2)
        }
    );
    // Third attempt was the last one.
    assert_eq!(executor.decide(&transient, 2), Decision::Fail);
    assert_eq!(executor.decide(&Error::remote(401, "no"), 0), Decision::Fail);
}
