//! Error types for factsheet-loader
//!
//! This module provides the error handling for the library:
//! - A single [`Error`] enum covering configuration, transport, GraphQL and
//!   payload failures as well as loader state violations
//! - A [`Result`] alias used throughout the crate
//! - Classification helpers so a presentation layer can tell transport
//!   failures from malformed payloads

use thiserror::Error;

/// Result type alias for factsheet-loader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for factsheet-loader
///
/// Stale responses are not errors: a response that was superseded by a reset
/// or page size change is reported as [`FetchOutcome::Discarded`](crate::types::FetchOutcome::Discarded).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "host.endpoint")
        key: Option<String>,
    },

    /// Host init/ready handshake failed
    #[error("host initialization failed: {0}")]
    HostInit(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Transport-level failure that is not a `reqwest` error (HTTP status, host SDK rejection)
    #[error("transport error: {0}")]
    Transport(String),

    /// The GraphQL endpoint answered with one or more errors
    #[error("GraphQL error: {}", .messages.join("; "))]
    GraphQl {
        /// Error messages reported by the server, in response order
        messages: Vec<String>,
    },

    /// The response payload is missing expected fields or breaks a loader invariant
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A fetch was requested before the host handshake completed
    #[error("loader not initialized: call initialize() first")]
    NotInitialized,

    /// A fetch was requested while another one is still outstanding
    #[error("a page fetch is already in flight")]
    FetchInFlight,

    /// Cannot perform operation in the current run phase
    #[error("cannot {operation} while run is {phase}")]
    InvalidState {
        /// The operation that was attempted (e.g., "fetch next page")
        operation: String,
        /// The run phase that prevents the operation
        phase: String,
    },

    /// The run was reset or reconfigured while being driven to completion
    #[error("run superseded by a reset or page size change")]
    Superseded,
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Returns true if the error came from the transport or the host
    ///
    /// These are the failures that end a run as a terminal condition without
    /// touching accumulated data.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Transport(_) | Error::HostInit(_) | Error::GraphQl { .. }
        )
    }

    /// Returns true if the payload itself was unusable
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedResponse(_) | Error::Serialization(_))
    }

    /// Machine-readable error code for presentation layers
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::HostInit(_) => "host_init_failed",
            Error::Network(_) => "network_error",
            Error::Transport(_) => "transport_error",
            Error::GraphQl { .. } => "graphql_error",
            Error::MalformedResponse(_) => "malformed_response",
            Error::Serialization(_) => "serialization_error",
            Error::NotInitialized => "not_initialized",
            Error::FetchInFlight => "fetch_in_flight",
            Error::InvalidState { .. } => "invalid_state",
            Error::Superseded => "superseded",
        }
    }
}
