//! Error types for Quickdraw.
//!
//! Responder failures are contained at the responder boundary and only
//! surface to callers when every responder in a race has failed.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Quickdraw operations.
#[derive(Error, Debug)]
pub enum QuickdrawError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Race outcome errors
    #[error(transparent)]
    Race(#[from] RaceError),

    /// A single responder call failed outside of a race
    #[error(transparent)]
    Responder(#[from] ResponderError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A responder needs an API key that could not be resolved
    #[error("{responder} API key not set. Set {env} or add api_key to the config.")]
    MissingApiKey { responder: String, env: String },

    /// `--only` named a responder that is not configured
    #[error("Unknown responder: {0}")]
    UnknownResponder(String),
}

/// Failure of a single responder call.
#[derive(Error, Debug)]
pub enum ResponderError {
    /// The backend could not be reached (refused, DNS, reset before a reply)
    #[error("{message}")]
    Connect { message: String },

    /// Auth, quota or non-success HTTP status, or a failed transfer
    #[error("{message}")]
    Http {
        message: String,
        status_code: Option<u16>,
    },

    /// The backend answered but the reply was malformed or empty
    #[error("{message}")]
    Parse { message: String },

    /// The call exceeded its per-responder timeout
    #[error("{responder} timed out after {timeout_ms}ms")]
    Timeout { responder: String, timeout_ms: u64 },

    /// The input document could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote extraction job reported failure
    #[error("Extraction job failed: {message}")]
    Job { message: String },
}

/// One responder's entry in an aggregate failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponderFailure {
    pub responder: String,
    pub error: String,
}

impl ResponderFailure {
    pub fn new(responder: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            responder: responder.into(),
            error: error.into(),
        }
    }
}

/// Errors that end a race without a winner.
#[derive(Error, Debug)]
pub enum RaceError {
    /// The race was started with an empty responder set
    #[error("No responders configured")]
    NoResponders,

    /// Every responder failed (or the overall deadline passed first)
    #[error("{}", all_failed_message(.timed_out, .failures))]
    AllFailed {
        failures: Vec<ResponderFailure>,
        timed_out: bool,
    },
}

fn all_failed_message(timed_out: &bool, failures: &[ResponderFailure]) -> String {
    let headline = if *timed_out {
        "all responders failed or timed out"
    } else {
        "all responders failed"
    };
    let mut message = headline.to_string();
    for failure in failures {
        message.push_str(&format!("\n  [{}] {}", failure.responder, failure.error));
    }
    message
}

/// Convenience type alias for Quickdraw results.
pub type Result<T> = std::result::Result<T, QuickdrawError>;
