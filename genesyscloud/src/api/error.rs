use thiserror::Error;
use tflifecycle::{LifecycleError, RemoteError};

use super::common::ApiErrorDetails;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
        #[source]
        details: Option<Box<ApiErrorDetails>>,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,
}

impl ApiError {
    /// HTTP status behind the error, when the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            ApiError::AuthError(_) => Some(401),
            ApiError::RateLimited => Some(429),
            ApiError::ServiceUnavailable => Some(503),
            ApiError::RequestError(e) => e.status().map(|s| s.as_u16()),
            ApiError::ParseError(_) | ApiError::InvalidUrl(_) | ApiError::Timeout(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<ApiError> for RemoteError {
    fn from(err: ApiError) -> Self {
        RemoteError::new(err.status(), err.to_string())
    }
}

impl From<ApiError> for LifecycleError {
    fn from(err: ApiError) -> Self {
        LifecycleError::Transport(err.into())
    }
}
