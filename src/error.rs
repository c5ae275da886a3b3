//! Failure kinds of a streaming completion.

use thiserror::Error;

/// Terminal failure of one completion. None of these are retried here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// DNS, TCP or TLS failure while reaching the endpoint.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The request could not be written or the response head/body not read.
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("HTTP {status}: {message}")]
    HttpError { status: u16, message: String },
    /// The provider reported an error in an otherwise well-formed response.
    #[error("API error: {0}")]
    ApiError(String),
}

impl StreamError {
    /// Short machine-readable code for logs and envelopes.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            StreamError::ConnectionFailed(_) => "connection_failed".to_string(),
            StreamError::RequestFailed(_) => "request_failed".to_string(),
            StreamError::HttpError { status, .. } => format!("http_{status}"),
            StreamError::ApiError(_) => "api_error".to_string(),
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_builder() {
            StreamError::ConnectionFailed(err.to_string())
        } else {
            StreamError::RequestFailed(err.to_string())
        }
    }
}
