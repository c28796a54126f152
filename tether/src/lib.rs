//! # Tether - Resilient Server-Sent Events for Rust
//!
//! Tether keeps a long-lived server-sent events stream alive. It decodes the
//! stream into events, and when the connection fails it reconnects with jittered
//! exponential backoff, honouring server hints.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tether::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> tether::Result<()> {
//!     let config = EventSourceConfig::builder("https://example.com/events")
//!         .header("Authorization", "Bearer token")
//!         .build()?;
//!
//!     let (source, mut notifications) = EventSource::with_channel(config);
//!     source.open()?;
//!
//!     while let Some(notification) = notifications.recv().await {
//!         match notification {
//!             Notification::Event(event) => println!("{}: {}", event.event_type, event.data),
//!             Notification::StateChange { new, .. } => println!("now {new}"),
//!             Notification::Error(failure) => {
//!                 eprintln!("gave up with status {}", failure.status);
//!                 break;
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Key Features
//!
//! - **Chunking-transparent decoding** of UTF-8 lines and SSE frames
//! - **Reconnection** with `Retry-After` support, jitter and a 5 minute cap
//! - **Server-declared minimum delay** through the `retry:` field
//! - **Inactivity watchdog** to detect silently dead connections
//! - **Connectivity awareness** through injectable platform signals
//! - **Pluggable transport** with a `reqwest` implementation
//!
//! ## Ready States
//!
//! A session moves through `CLOSED → CONNECTING → OPEN → (WAITING → CONNECTING)*`
//! and back to `CLOSED` when closed or on a permanent failure. Transient failures
//! (network errors, 429, 5xx, the server ending the stream) only ever show up as
//! a move to `WAITING`.
//!
//! ## Architecture
//!
//! Tether is organized as a workspace of focused crates:
//!
//! - [`tether_core`] - Ready states, event records, identifiers and errors
//! - [`tether_streaming`] - Line decoding and frame parsing
//! - [`tether_retries`] - Failure classification and backoff
//! - `tether` (this crate) - The state machine, transport and monitor

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod attempt;
pub mod config;
mod driver;
pub mod monitor;
pub mod observer;
pub mod session;
pub mod signals;
pub mod transport;
pub mod watchdog;

// ============================================================================
// Re-exports
// ============================================================================

pub use tether_core as core;
pub use tether_retries as retries;
pub use tether_streaming as streaming;

pub use tether_core::{
    EventSourceId, ReadyState, Result, ServerSentEvent, TetherError, DEFAULT_EVENT_TYPE,
};
pub use tether_retries::{BackoffConfig, FailureKind};

pub use config::{
    EventSourceConfig, EventSourceConfigBuilder, DEFAULT_CONNECTIVITY_DEBOUNCE,
    DEFAULT_INACTIVITY_TIMEOUT,
};
pub use monitor::{MonitorAction, NetworkMonitor};
pub use observer::{
    CallbackObserver, ChannelObserver, EventSourceObserver, NoopObserver, Notification,
    PermanentFailure,
};
pub use session::{EventSource, EventSourceBuilder};
pub use signals::{ConnectivitySource, ManualSignals, NoSignals, PlatformSignal, PlatformSignals};
pub use transport::{
    BodyStream, ReqwestTransport, ResponseHead, SseRequest, Transport, TransportError,
    TransportResponse,
};
pub use watchdog::Watchdog;

/// Convenient prelude for common imports.
///
/// ```rust
/// use tether::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BackoffConfig, CallbackObserver, ChannelObserver, EventSource, EventSourceConfig,
        EventSourceObserver, ManualSignals, Notification, PermanentFailure, PlatformSignals,
        ReadyState, Result, ServerSentEvent, TetherError, Transport,
    };
}

/// Returns the current version of tether.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), "0.1.0");
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let config = EventSourceConfig::new("https://example.com/events").unwrap();
        assert_eq!(config.backoff(), &BackoffConfig::default());
        assert_eq!(ReadyState::default(), ReadyState::Closed);
    }
}
