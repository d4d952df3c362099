//! 标准错误码：定义编排层使用的错误分类及其重试语义。
//!
//! Standard error codes used by the orchestration core.
//!
//! Every failure that reaches the retry executor is mapped onto one of these
//! codes. The code decides whether another attempt is worth making.
//!
//! ## Error Code Categories
//!
//! | Prefix | Category    | Retryable | Description                       |
//! |--------|-------------|-----------|-----------------------------------|
//! | E1xxx  | client      | no        | Credentials, permissions, input   |
//! | E2xxx  | rate        | yes       | Upstream rate limiting            |
//! | E3xxx  | server      | yes       | Provider-side and network errors  |
//! | E4xxx  | operational | no        | Local budget and lifecycle errors |
//! | E9xxx  | unknown     | yes       | Catch-all / unclassified          |
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_orchestrator::error_code::StandardErrorCode;
//!
//! let code = StandardErrorCode::from_http_status(401);
//! assert_eq!(code.code(), "E1002");
//! assert!(!code.retryable());
//! assert_eq!(code.category(), "client");
//! ```

use std::fmt;

/// Canonical error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardErrorCode {
    /// E1001: Malformed request, invalid parameters, or failed validation
    InvalidRequest,
    /// E1002: Invalid, expired, or missing API key
    Authentication,
    /// E1003: Valid credentials but insufficient permissions
    PermissionDenied,
    /// E1005: Input exceeds context window or API payload size limit
    RequestTooLarge,
    /// E2001: Upstream rate limit exceeded
    RateLimited,
    /// E3001: Internal server error on provider side
    ServerError,
    /// E3002: Provider service temporarily overloaded
    Overloaded,
    /// E3003: Attempt did not complete within the configured timeout
    Timeout,
    /// E3004: Connection could not be established or was interrupted
    Network,
    /// E4001: Estimated cost can never fit inside one accounting window
    BudgetExceeded,
    /// E4002: The orchestrator was destroyed while the call was pending
    ShuttingDown,
    /// E9999: Error could not be classified
    Unknown,
}

impl StandardErrorCode {
    /// Returns the canonical code string (e.g., `"E1001"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "E1001",
            Self::Authentication => "E1002",
            Self::PermissionDenied => "E1003",
            Self::RequestTooLarge => "E1005",
            Self::RateLimited => "E2001",
            Self::ServerError => "E3001",
            Self::Overloaded => "E3002",
            Self::Timeout => "E3003",
            Self::Network => "E3004",
            Self::BudgetExceeded => "E4001",
            Self::ShuttingDown => "E4002",
            Self::Unknown => "E9999",
        }
    }

    /// Returns the standard name (e.g., `"invalid_request"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::RequestTooLarge => "request_too_large",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::BudgetExceeded => "budget_exceeded",
            Self::ShuttingDown => "shutting_down",
            Self::Unknown => "unknown",
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// Client errors fail identically on every attempt, and operational errors
    /// are decided locally, so neither is retried. Unclassified errors are
    /// treated as transient.
    #[inline]
    pub fn retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidRequest
                | Self::Authentication
                | Self::PermissionDenied
                | Self::RequestTooLarge
                | Self::BudgetExceeded
                | Self::ShuttingDown
        )
    }

    /// Returns the category: `"client"`, `"rate"`, `"server"`, `"operational"`, or `"unknown"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest
            | Self::Authentication
            | Self::PermissionDenied
            | Self::RequestTooLarge => "client",
            Self::RateLimited => "rate",
            Self::ServerError | Self::Overloaded | Self::Timeout | Self::Network => "server",
            Self::BudgetExceeded | Self::ShuttingDown => "operational",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a provider error code/type string to the corresponding `StandardErrorCode`.
    ///
    /// Supports the standard names as well as common provider aliases such as
    /// `"invalid_api_key"`, `"context_length_exceeded"` or `"overloaded_error"`.
    pub fn from_provider_code(provider_code: &str) -> Option<Self> {
        let code = match provider_code {
            "invalid_request" | "invalid_request_error" | "validation_error" => {
                Self::InvalidRequest
            }
            "authentication" | "authentication_error" | "invalid_api_key" | "unauthorized" => {
                Self::Authentication
            }
            "permission_denied" | "permission_error" | "forbidden" => Self::PermissionDenied,
            "request_too_large" | "context_length_exceeded" => Self::RequestTooLarge,
            "rate_limited" | "rate_limit_exceeded" | "rate_limit_error" => Self::RateLimited,
            "server_error" | "api_error" => Self::ServerError,
            "overloaded" | "overloaded_error" => Self::Overloaded,
            "timeout" => Self::Timeout,
            "network" => Self::Network,
            _ => return None,
        };
        Some(code)
    }

    /// Maps an HTTP status code to the most likely `StandardErrorCode`.
    ///
    /// Any other 4xx is treated as a malformed request; any other 5xx as a
    /// server error.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            408 => Self::Timeout,
            413 => Self::RequestTooLarge,
            429 => Self::RateLimited,
            503 | 529 => Self::Overloaded,
            504 => Self::Timeout,
            402..=499 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for StandardErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_not_retryable() {
        for status in [400u16, 401, 403, 413, 422] {
            let code = StandardErrorCode::from_http_status(status);
            assert!(!code.retryable(), "HTTP {} should not be retried", status);
            assert_eq!(code.category(), "client");
        }
    }

    #[test]
    fn test_transient_statuses_are_retryable() {
        for status in [408u16, 429, 500, 502, 503, 504, 529] {
            assert!(
                StandardErrorCode::from_http_status(status).retryable(),
                "HTTP {} should be retried",
                status
            );
        }
    }

    #[test]
    fn test_provider_aliases() {
        assert_eq!(
            StandardErrorCode::from_provider_code("invalid_api_key"),
            Some(StandardErrorCode::Authentication)
        );
        assert_eq!(
            StandardErrorCode::from_provider_code("context_length_exceeded"),
            Some(StandardErrorCode::RequestTooLarge)
        );
        assert_eq!(StandardErrorCode::from_provider_code("teapot"), None);
    }

    #[test]
    fn test_operational_codes() {
        assert!(!StandardErrorCode::ShuttingDown.retryable());
        assert!(!StandardErrorCode::BudgetExceeded.retryable());
        assert_eq!(StandardErrorCode::ShuttingDown.category(), "operational");
        assert!(StandardErrorCode::Unknown.retryable());
    }
}
