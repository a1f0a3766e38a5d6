//! Error types for the dashboard API client

use std::io;

use thiserror::Error;

use crate::auth::ExchangeFailure;

/// Result type alias for the dashboard API client
pub type Result<T> = std::result::Result<T, Error>;

/// Dashboard API client errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The one-time authorization code could not be exchanged
    #[error("Code exchange failed: {0}")]
    ExchangeFailed(#[from] ExchangeFailure),

    /// The backend rejected the current credential
    #[error("Unauthorized: credential rejected by backend")]
    Unauthorized,

    /// The backend could not be reached at all
    #[error("Service unreachable: {0}")]
    ServiceUnreachable(String),

    /// Application-level error returned by the backend
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// Malformed URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Credential storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification callers use to choose what to show the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Sign-in via authorization code did not complete
    ExchangeFailed,
    /// Logged out: the credential is gone or was rejected
    Unauthorized,
    /// The backend is down or unreachable
    ServiceUnreachable,
    /// Anything else, including backend application errors
    Other,
}

impl Error {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ExchangeFailed(_) => ErrorKind::ExchangeFailed,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::ServiceUnreachable(_) => ErrorKind::ServiceUnreachable,
            _ => ErrorKind::Other,
        }
    }

    /// Message suitable for display in the dashboard
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ExchangeFailed(_) => {
                "Sign-in could not be completed. Please log in again.".to_string()
            }
            Self::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            Self::ServiceUnreachable(_) => {
                "Failed to connect to backend. Please check your connection.".to_string()
            }
            Self::Api { message, .. } if !message.is_empty() => message.clone(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// Whether this error means the user has to sign in again
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self.kind(), ErrorKind::ExchangeFailed | ErrorKind::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn kinds_are_distinguishable() {
        assert_eq!(Error::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            Error::ServiceUnreachable("connection refused".into()).kind(),
            ErrorKind::ServiceUnreachable
        );
        assert_eq!(
            Error::from(ExchangeFailure::Timeout(Duration::from_secs(10))).kind(),
            ErrorKind::ExchangeFailed
        );
        assert_eq!(
            Error::Api {
                status: 500,
                message: "boom".into()
            }
            .kind(),
            ErrorKind::Other
        );
    }

    #[test]
    fn logged_out_and_backend_down_read_differently() {
        let logged_out = Error::Unauthorized.user_message();
        let down = Error::ServiceUnreachable("refused".into()).user_message();
        assert_ne!(logged_out, down);
        assert!(Error::Unauthorized.requires_login());
        assert!(!Error::ServiceUnreachable("refused".into()).requires_login());
    }

    #[test]
    fn api_error_surfaces_backend_message() {
        let err = Error::Api {
            status: 422,
            message: "Salary must be positive".into(),
        };
        assert_eq!(err.user_message(), "Salary must be positive");

        let empty = Error::Api {
            status: 500,
            message: String::new(),
        };
        assert_eq!(empty.user_message(), "Something went wrong. Please try again.");
    }
}
