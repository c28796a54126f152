//! Streaming errors.

use thiserror::Error;

/// Errors that can occur while reading an event stream body.
///
/// Malformed SSE content is never an error: unknown fields, comments and bad
/// `retry` values are ignored by the parser.
#[derive(Debug, Error)]
pub enum StreamError {
    /// An unterminated line or pending frame grew past the size limit.
    #[error("Buffer overflow: more than {} bytes pending", crate::MAX_BUFFER_SIZE)]
    BufferOverflow,

    /// The body stream failed.
    #[error("Body error: {0}")]
    Body(String),

    /// Reading was cancelled.
    #[error("Stream aborted")]
    Aborted,
}

impl StreamError {
    /// Create from any error.
    pub fn from_err<E: std::fmt::Display>(err: E) -> Self {
        Self::Body(err.to_string())
    }

    /// Check if the stream was cancelled rather than broken.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(StreamError::Aborted.to_string(), "Stream aborted");
        assert_eq!(
            StreamError::from_err("connection reset").to_string(),
            "Body error: connection reset"
        );
    }

    #[test]
    fn test_aborted() {
        assert!(StreamError::Aborted.is_aborted());
        assert!(!StreamError::Body("x".into()).is_aborted());
        assert!(!StreamError::BufferOverflow.is_aborted());
    }
}
