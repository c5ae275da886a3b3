//! Error classification for callers deciding whether to continue a session.

use crate::error::StreamError;

/// Broad category for typed error handling and policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Authentication,
    RateLimit,
    InvalidInput,
    Provider,
    Internal,
}

/// Severity hint for UI and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

/// Unified envelope handed to the caller's error channel.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEnvelope {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub recoverable: bool,
    pub code: String,
    pub message: String,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn new(
        category: ErrorCategory,
        severity: ErrorSeverity,
        recoverable: bool,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            recoverable,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&StreamError> for ErrorEnvelope {
    fn from(value: &StreamError) -> Self {
        let code = value.code();
        match value {
            StreamError::ConnectionFailed(message) | StreamError::RequestFailed(message) => {
                Self::new(
                    ErrorCategory::Network,
                    ErrorSeverity::Error,
                    true,
                    code,
                    message.clone(),
                )
            }
            StreamError::HttpError { status, message } => {
                let (category, severity, recoverable) = match status {
                    401 | 403 => (ErrorCategory::Authentication, ErrorSeverity::Critical, false),
                    429 => (ErrorCategory::RateLimit, ErrorSeverity::Warning, true),
                    500..=599 => (ErrorCategory::Provider, ErrorSeverity::Error, true),
                    _ => (ErrorCategory::InvalidInput, ErrorSeverity::Error, false),
                };
                Self::new(
                    category,
                    severity,
                    recoverable,
                    code,
                    format!("HTTP {status}: {message}"),
                )
            }
            StreamError::ApiError(message) => Self::new(
                ErrorCategory::Provider,
                ErrorSeverity::Error,
                false,
                code,
                message.clone(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_statuses_map_to_categories() {
        let auth = ErrorEnvelope::from(&StreamError::HttpError {
            status: 401,
            message: "bad key".to_string(),
        });
        assert_eq!(auth.category, ErrorCategory::Authentication);
        assert!(!auth.recoverable);
        assert_eq!(auth.code, "http_401");

        let limited = ErrorEnvelope::from(&StreamError::HttpError {
            status: 429,
            message: "slow down".to_string(),
        });
        assert_eq!(limited.category, ErrorCategory::RateLimit);
        assert!(limited.recoverable);

        let busy = ErrorEnvelope::from(&StreamError::HttpError {
            status: 500,
            message: "server busy".to_string(),
        });
        assert_eq!(busy.message, "HTTP 500: server busy");
        assert!(busy.recoverable);
    }

    #[test]
    fn network_errors_are_recoverable() {
        let envelope = ErrorEnvelope::from(&StreamError::ConnectionFailed("refused".to_string()));
        assert_eq!(envelope.category, ErrorCategory::Network);
        assert!(envelope.recoverable);
    }

    #[test]
    fn api_errors_are_terminal() {
        let envelope = ErrorEnvelope::from(&StreamError::ApiError("rate limited".to_string()));
        assert_eq!(envelope.category, ErrorCategory::Provider);
        assert!(!envelope.recoverable);
        assert_eq!(envelope.message, "rate limited");
    }
}
