//! Failure taxonomy shared by the config store, API client and auth flow.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AltaryError>;

/// Every failure an operation can surface to the tool layer.
#[derive(Debug, thiserror::Error)]
pub enum AltaryError {
    /// Missing, invalid or expired token, or a failed browser flow.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A second browser login was requested while one is still waiting.
    #[error("authentication failed: a browser login is already in progress")]
    LoginInProgress,

    /// Missing project id or unusable local configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Connection, DNS, TLS or request-timeout failure talking to Altary.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// No browser callback arrived before the deadline.
    #[error("timed out after {}s waiting for the browser login", .0.as_secs())]
    Timeout(Duration),

    #[error("could not write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A non-successful answer from the Altary API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("the token was rejected (HTTP 401); run setup_auth again")]
    Unauthorized,

    #[error("permission denied (HTTP 403)")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request failed with HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A 2xx response whose body reports an error.
    #[error("API error: {0}")]
    Remote(String),

    /// A 2xx response that could not be decoded.
    #[error("unexpected response from Altary: {0}")]
    Malformed(String),
}

impl AltaryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        AltaryError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether re-running `setup_auth` is the likely fix.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            AltaryError::Auth(_) | AltaryError::Api(ApiError::Unauthorized)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_reports_seconds() {
        let err = AltaryError::Timeout(Duration::from_secs(300));
        assert_eq!(
            err.to_string(),
            "timed out after 300s waiting for the browser login"
        );
    }

    #[test]
    fn api_errors_display_through_the_wrapper() {
        let err = AltaryError::from(ApiError::NotFound("error E-1".to_string()));
        assert_eq!(err.to_string(), "not found: error E-1");
        assert!(!err.needs_reauth());
        assert!(AltaryError::from(ApiError::Unauthorized).needs_reauth());
    }
}
