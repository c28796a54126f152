//! Error types for tether.
//!
//! Connection failures are not errors from the consumer's point of view: transient
//! failures drive reconnection and permanent failures are reported through the
//! observer. The errors here cover misconfiguration and misuse of the API.

use thiserror::Error;

/// The main error type for tether operations.
#[derive(Error, Debug)]
pub enum TetherError {
    /// The target URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The target URL uses a scheme other than http or https.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// A configured header name or value is not valid HTTP.
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader {
        /// Header name as supplied.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The background driver has shut down.
    #[error("Event source driver has shut down")]
    DriverShutdown,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TetherError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid header error.
    pub fn invalid_header(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidHeader {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias using TetherError.
pub type Result<T> = std::result::Result<T, TetherError>;
