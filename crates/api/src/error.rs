//! Errors surfaced by the session API.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// A failed session request.
///
/// `Clone` so one failure can be handed to every caller waiting on the same
/// save.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApiError {
    #[error("request failed with status {status}")]
    Status {
        status: StatusCode,
        retry_after: Option<Duration>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid request url: {0}")]
    Url(String),
}

impl ApiError {
    #[must_use]
    pub fn status(status: StatusCode) -> Self {
        Self::Status {
            status,
            retry_after: None,
        }
    }

    /// A 503 carrying the server's requested delay.
    #[must_use]
    pub fn unavailable(retry_after: Option<Duration>) -> Self {
        Self::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            retry_after,
        }
    }

    /// True for HTTP 503, the only failure worth retrying.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::SERVICE_UNAVAILABLE)
    }

    /// Delay requested through `Retry-After`, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors building an API client from configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error(transparent)]
    Client(#[from] reqwest::Error),
}
