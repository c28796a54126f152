//! # tether-retries
//!
//! Reconnection policy for tether.
//!
//! This crate decides whether a failed connection attempt should be retried and
//! how long to wait before the next one.
//!
//! ## Core Concepts
//!
//! - **[`BackoffConfig`]**: Jitter windows, growth factor and cap
//! - **[`ReconnectBackoff`]**: Per-session backoff state and delay computation
//! - **[`AttemptFailure`]**: How an attempt ended
//! - **[`FailureKind`]**: Transient (reconnect) or permanent (give up)
//! - **[`parse_retry_after`]**: Read a server's `Retry-After` hint
//!
//! ## Delay Policy
//!
//! 1. A positive `Retry-After` header wins, plus up to 5 s of jitter.
//! 2. The first failure of an episode waits a random 0–3 s.
//! 3. Later failures double the previous delay, capped at 5 minutes.
//!
//! The scheduled delay is never shorter than a `retry:` minimum the stream
//! declared.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use tether_retries::{AttemptFailure, BackoffConfig, FailureKind, ReconnectBackoff};
//!
//! let failure = AttemptFailure::status(503, None);
//! assert_eq!(failure.kind(), FailureKind::Transient);
//!
//! let mut backoff = ReconnectBackoff::new(BackoffConfig::default());
//! let first = backoff.next_delay(failure.retry_after());
//! assert!(first <= Duration::from_secs(3));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod backoff;
pub mod config;
pub mod error;
pub mod policy;
pub mod retry_after;

// Re-exports
pub use backoff::ReconnectBackoff;
pub use config::BackoffConfig;
pub use error::AttemptFailure;
pub use policy::{classify, FailureKind};
pub use retry_after::parse_retry_after;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        classify, parse_retry_after, AttemptFailure, BackoffConfig, FailureKind,
        ReconnectBackoff,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let config = BackoffConfig::default();
        assert_eq!(config.max_delay, Duration::from_secs(300));
        assert_eq!(classify(true, 0), FailureKind::Transient);
    }
}
