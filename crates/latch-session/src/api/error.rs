//! # API Errors
//!
//! Error types for backend and identity lookup requests.

use thiserror::Error;

/// Errors that can occur during API operations.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request could not be sent or the response could not be received.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{status_text}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status (e.g. `Unauthorized`).
        status_text: String,
        /// The `error` field of the response body, or the raw body.
        message: String,
    },

    /// The response was missing fields the caller depends on.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ApiError {
    /// Returns the HTTP status for server errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::MalformedResponse(_) => None,
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
