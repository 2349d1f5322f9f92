//! Error types for cli-handoff

use crate::redirect::RedirectError;
use crate::types::StatusKind;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the handoff protocol, on either side of the wire
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input, rejected before anything is stored
    #[error("invalid input: {0}")]
    Validation(String),

    /// Redirect target failed loopback validation
    #[error("invalid redirect_uri: {0}")]
    InvalidRedirect(#[from] RedirectError),

    /// A pending login with this correlation id already exists
    #[error("a login with this correlation id is already pending")]
    DuplicateCorrelationId,

    /// Unknown id or expired entry (deliberately indistinguishable)
    #[error("login request not found or expired")]
    NotFoundOrExpired,

    /// Second redemption attempt on a one-time artifact
    #[error("login request was already used")]
    AlreadyConsumed,

    /// Entry exists but is not in the state the caller expected
    #[error("login request is {actual}, expected {expected}")]
    InvalidTransition {
        /// State the caller required
        expected: StatusKind,
        /// State the entry is actually in
        actual: StatusKind,
    },

    /// Echoed state did not match what the CLI generated
    #[error("callback state did not match this login attempt")]
    StateMismatch,

    /// No completion within the wait window
    #[error("timed out: {0}")]
    Timeout(String),

    /// Local callback listener could not be bound
    #[error("could not start local callback listener: {0}")]
    Bind(String),

    /// Server answered with an unexpected status
    #[error("server error: {0}")]
    Server(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether retrying the same operation may succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Http(_) | Self::Internal(_) | Self::Server(_)
        )
    }

    /// One-line hint printed by the CLI under the error
    pub const fn remediation(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidRedirect(_) | Self::Config(_) => {
                "Check the arguments and try again."
            }
            Self::Bind(_) => {
                "Could not listen on localhost. Retry with `handoff login --mode poll`."
            }
            Self::Http(_) | Self::Server(_) | Self::Internal(_) => {
                "Check that the server is reachable, then run `handoff login` again."
            }
            Self::Io(_) | Self::Json(_) => {
                "Check permissions on the handoff config directory, then run `handoff login` again."
            }
            Self::DuplicateCorrelationId
            | Self::NotFoundOrExpired
            | Self::AlreadyConsumed
            | Self::InvalidTransition { .. }
            | Self::StateMismatch
            | Self::Timeout(_) => "Run `handoff login` again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Timeout("no callback".into()).is_retryable());
        assert!(Error::Internal("boom".into()).is_retryable());
        assert!(!Error::AlreadyConsumed.is_retryable());
        assert!(!Error::StateMismatch.is_retryable());
        assert!(!Error::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn test_remediation_mentions_login() {
        assert!(Error::NotFoundOrExpired.remediation().contains("handoff login"));
        assert!(Error::StateMismatch.remediation().contains("handoff login"));
        assert!(Error::Bind("in use".into()).remediation().contains("--mode poll"));
    }

    #[test]
    fn test_not_found_message_does_not_leak_existence() {
        // Same text regardless of why the lookup failed
        assert_eq!(
            Error::NotFoundOrExpired.to_string(),
            "login request not found or expired"
        );
    }
}
