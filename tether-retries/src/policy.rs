//! Failure classification.

/// Whether a failed attempt should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Recovered automatically by reconnecting after a delay.
    Transient,
    /// The session closes and the consumer is told why.
    Permanent,
}

impl FailureKind {
    /// Check if the failure should be retried.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Classify the end of an attempt.
///
/// Network errors, 429 and any status of 500 or above are transient. Every
/// other status, including a 200 that was not an event stream, is permanent.
#[must_use]
pub fn classify(network_error: bool, status: u16) -> FailureKind {
    if network_error || status == 429 || status >= 500 {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}
