//! Server error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::{Denied, ListenerError};

/// Server errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An event listener could not be instantiated.
    #[error("configuration error: listener \"{listener}\" could not be created: {source}")]
    Listener {
        /// Identifier of the listener.
        listener: String,
        #[source]
        source: ListenerError,
    },

    /// Authentication provider error.
    #[error(transparent)]
    Provider(#[from] gatehouse_core::ProviderError),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned to HTTP clients.
///
/// Every failure surfaces as a bare 403; the cause is only logged.
#[derive(Debug)]
pub enum AppError {
    /// Authentication denied or failed.
    Forbidden,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

impl From<Denied> for AppError {
    fn from(_: Denied) -> Self {
        AppError::Forbidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_has_no_body() {
        let response = AppError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_listener_error_display() {
        let err = Error::Listener {
            listener: "audit-log".to_string(),
            source: ListenerError::new("no sink"),
        };
        let message = err.to_string();
        assert!(message.starts_with("configuration error"));
        assert!(message.contains("audit-log"));
        assert!(message.contains("no sink"));
    }
}
