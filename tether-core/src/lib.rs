//! # tether-core
//!
//! Core types and error handling for the tether event source client.
//!
//! This crate provides the value types shared by every layer of tether:
//!
//! - **Ready states**: The four connection states a session moves through
//! - **Events**: The immutable record handed to consumers for each dispatched event
//! - **Identifiers**: Type-safe IDs for event source sessions
//! - **Errors**: The top-level error type
//!
//! ## Example
//!
//! ```rust
//! use tether_core::{EventSourceId, ReadyState, ServerSentEvent};
//!
//! let source = EventSourceId::new();
//! let event = ServerSentEvent::new(source, "message", "hello", "https://example.com", "42");
//!
//! assert_eq!(event.data, "hello");
//! assert!(!ReadyState::Waiting.is_connected());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod errors;
pub mod event;
pub mod identifier;
pub mod state;

// Re-exports for convenience
pub use errors::{Result, TetherError};
pub use event::{ServerSentEvent, DEFAULT_EVENT_TYPE};
pub use identifier::EventSourceId;
pub use state::ReadyState;

/// Prelude module for common imports.
///
/// ```rust
/// use tether_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{Result, TetherError};
    pub use crate::event::ServerSentEvent;
    pub use crate::identifier::EventSourceId;
    pub use crate::state::ReadyState;
}
