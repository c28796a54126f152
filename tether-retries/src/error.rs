//! Attempt failure types.

use crate::policy::{classify, FailureKind};
use std::time::Duration;
use thiserror::Error;

/// How a connection attempt ended, when it did not end in a usable stream.
///
/// A stream that was open and then ended, for whatever reason, is reported as
/// [`AttemptFailure::Network`]: long-lived streams are expected to be reopened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    /// The request failed, was aborted, or the open stream ended.
    #[error("Network error")]
    Network {
        /// Retry-After hint from the response, if one was received.
        retry_after: Option<Duration>,
    },

    /// The server answered with a status (or content type) that is not an event stream.
    #[error("HTTP status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Retry-After hint from the response.
        retry_after: Option<Duration>,
    },
}

impl AttemptFailure {
    /// Create a network failure with no server hint.
    #[must_use]
    pub fn network() -> Self {
        Self::Network { retry_after: None }
    }

    /// Create a status failure.
    #[must_use]
    pub fn status(status: u16, retry_after: Option<Duration>) -> Self {
        Self::Status {
            status,
            retry_after,
        }
    }

    /// Get the suggested retry-after duration.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Network { retry_after } | Self::Status { retry_after, .. } => *retry_after,
        }
    }

    /// Get the HTTP status, or 0 for network failures.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Network { .. } => 0,
            Self::Status { status, .. } => *status,
        }
    }

    /// Classify the failure.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        classify(matches!(self, Self::Network { .. }), self.status_code())
    }
}
