use crate::error_code::StandardErrorCode;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "cache.ttl", "requests_per_window")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "health_probe")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the orchestration core.
///
/// Capability services report their failures through this type as well, so the
/// retry executor can tell transient failures from permanent ones.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Remote error: HTTP {status} ({code}): {message}")]
    Remote {
        status: u16,
        code: StandardErrorCode,
        message: String,
    },

    #[error("Operation timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("Network transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Estimated cost of {estimated} tokens exceeds the per-window budget of {budget}")]
    BudgetExceeded { estimated: u64, budget: u64 },

    #[error("Orchestrator is shutting down")]
    ShuttingDown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a remote error classified from its HTTP status.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Error::Remote {
            status,
            code: StandardErrorCode::from_http_status(status),
            message: message.into(),
        }
    }

    /// Create a remote error with an explicit classification.
    pub fn remote_with_code(status: u16, code: StandardErrorCode, message: impl Into<String>) -> Self {
        Error::Remote {
            status,
            code,
            message: message.into(),
        }
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Classify this error.
    pub fn standard_code(&self) -> StandardErrorCode {
        match self {
            Error::Configuration { .. } | Error::Validation { .. } => {
                StandardErrorCode::InvalidRequest
            }
            Error::Serialization(_) | Error::Yaml(_) => StandardErrorCode::InvalidRequest,
            Error::Remote { code, .. } => *code,
            Error::Timeout { .. } => StandardErrorCode::Timeout,
            Error::Transport(e) => {
                if e.is_timeout() {
                    StandardErrorCode::Timeout
                } else if let Some(status) = e.status() {
                    StandardErrorCode::from_http_status(status.as_u16())
                } else {
                    StandardErrorCode::Network
                }
            }
            Error::Io(_) => StandardErrorCode::Network,
            Error::BudgetExceeded { .. } => StandardErrorCode::BudgetExceeded,
            Error::ShuttingDown => StandardErrorCode::ShuttingDown,
            Error::Runtime { .. } => StandardErrorCode::Unknown,
        }
    }

    /// Whether the retry executor may attempt the call again.
    pub fn is_retryable(&self) -> bool {
        self.standard_code().retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_classification() {
        assert!(!Error::remote(401, "bad key").is_retryable());
        assert!(!Error::remote(403, "nope").is_retryable());
        assert!(!Error::remote(400, "bad body").is_retryable());
        assert!(Error::remote(500, "boom").is_retryable());
        assert!(Error::remote(429, "slow down").is_retryable());
    }

    #[test]
    fn test_local_errors() {
        assert!(Error::Timeout { after: Duration::from_secs(1) }.is_retryable());
        assert!(!Error::ShuttingDown.is_retryable());
        assert!(!Error::validation_with_context("missing field", ErrorContext::new()).is_retryable());
        assert!(Error::runtime_with_context("flaky", ErrorContext::new()).is_retryable());
    }

    #[test]
    fn test_context_display() {
        let err = Error::configuration_with_context(
            "must be positive",
            ErrorContext::new()
                .with_field_path("tokens_per_window")
                .with_source("config"),
        );
        let msg = err.to_string();
        assert!(msg.contains("field: tokens_per_window"));
        assert!(msg.contains("source: config"));
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("tokens_per_window")
        );
    }
}
