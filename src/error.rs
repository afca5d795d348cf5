//! Error types for listing-collector
//!
//! This module provides the error taxonomy for the library:
//! - [`Error`] - top-level error returned by controller, config and export operations
//! - [`FetchError`] - failures reported by a [`ListingSource`](crate::source::ListingSource)
//! - [`ExportError`] - failures while serializing collected listings
//!
//! Every variant maps to a stable, machine-readable code via [`Error::error_code`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for listing-collector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for listing-collector
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "collection.page_limit")
        key: Option<String>,
    },

    /// A control operation was requested in a state that does not allow it
    #[error("cannot {operation} while collection is {current_state}")]
    InvalidState {
        /// The operation that was attempted (e.g., "start", "pause")
        operation: String,
        /// The run state that prevented the operation (e.g., "running")
        current_state: String,
    },

    /// The listing source failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Exporting the collected listings failed
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// No async runtime was available to drive the collection worker
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Create a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidState { .. } => "invalid_state",
            Error::Fetch(e) => e.error_code(),
            Error::Export(_) => "export_error",
            Error::Runtime(_) => "runtime_error",
        }
    }
}

/// Errors reported by a listing source for a single page fetch
///
/// Cloneable so the controller can store it as the run's last error and
/// broadcast it to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// Missing or rejected credential (HTTP 401/403); never retried
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Message reported by the upstream API
        message: String,
    },

    /// Upstream answered with a non-success status
    #[error("server error (HTTP {status}): {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Status text or error body excerpt
        message: String,
    },

    /// Response body did not match the expected schema, or a required field was missing
    #[error("decode error: {message}")]
    DecodeError {
        /// Description of what failed to decode
        message: String,
    },

    /// Network-level failure (connect, reset, timeout)
    #[error("transport error: {message}")]
    TransportError {
        /// Description of the transport failure
        message: String,
        /// Whether the failure was a timeout
        timeout: bool,
    },
}

impl FetchError {
    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        FetchError::DecodeError {
            message: message.into(),
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            FetchError::Unauthorized { .. } => "unauthorized",
            FetchError::ServerError { .. } => "server_error",
            FetchError::DecodeError { .. } => "decode_error",
            FetchError::TransportError { .. } => "transport_error",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return FetchError::decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return FetchError::ServerError {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        FetchError::TransportError {
            message: err.to_string(),
            timeout: err.is_timeout(),
        }
    }
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV encoding failed
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Writing the artifact failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, &'static str)> {
        vec![
            (
                Error::config("collection.page_limit", "must be at least 1"),
                "config_error",
            ),
            (
                Error::InvalidState {
                    operation: "start".into(),
                    current_state: "running".into(),
                },
                "invalid_state",
            ),
            (
                Error::Fetch(FetchError::Unauthorized {
                    message: "bad token".into(),
                }),
                "unauthorized",
            ),
            (
                Error::Fetch(FetchError::ServerError {
                    status: 502,
                    message: "bad gateway".into(),
                }),
                "server_error",
            ),
            (
                Error::Fetch(FetchError::decode("missing field `name`")),
                "decode_error",
            ),
            (
                Error::Fetch(FetchError::TransportError {
                    message: "connection reset".into(),
                    timeout: false,
                }),
                "transport_error",
            ),
            (
                Error::Export(ExportError::Io(std::io::Error::other("disk full"))),
                "export_error",
            ),
            (Error::Runtime("no reactor".into()), "runtime_error"),
        ]
    }

    #[test]
    fn every_variant_has_expected_code() {
        for (error, code) in all_error_variants() {
            assert_eq!(error.error_code(), code, "wrong code for {error}");
        }
    }

    #[test]
    fn config_error_keeps_key() {
        match Error::config("source.endpoint", "not a valid URL") {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("source.endpoint"));
                assert_eq!(message, "not a valid URL");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn invalid_state_message_is_readable() {
        let err = Error::InvalidState {
            operation: "resume".into(),
            current_state: "stopped".into(),
        };
        assert_eq!(err.to_string(), "cannot resume while collection is stopped");
    }

    #[test]
    fn fetch_error_display_surfaces_upstream_message() {
        let err = FetchError::Unauthorized {
            message: "Invalid API key".into(),
        };
        assert_eq!(err.to_string(), "unauthorized: Invalid API key");

        let wrapped: Error = err.into();
        assert_eq!(wrapped.to_string(), "fetch error: unauthorized: Invalid API key");
    }

    #[test]
    fn fetch_error_serializes_with_kind_tag() {
        let err = FetchError::ServerError {
            status: 503,
            message: "unavailable".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "server_error");
        assert_eq!(json["status"], 503);
    }
}
