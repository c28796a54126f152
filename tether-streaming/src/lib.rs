//! # tether-streaming
//!
//! Wire-format support for tether.
//!
//! This crate turns the raw bytes of an HTTP response body into server-sent
//! event frames. It performs no I/O of its own.
//!
//! ## Core Concepts
//!
//! - **[`LineDecoder`]**: Incremental UTF-8 decoding and line splitting over
//!   arbitrarily fragmented chunks
//! - **[`LineStream`]**: Stream adapter yielding lines from a byte stream, with an
//!   activity hook invoked for every chunk
//! - **[`SseFrameParser`]**: Accumulates `event`/`data`/`id`/`retry` fields and
//!   flushes a frame on each blank line
//!
//! ## Example - Line Decoding
//!
//! ```rust
//! use tether_streaming::LineDecoder;
//!
//! let mut decoder = LineDecoder::new();
//! assert!(decoder.feed(b"data: hel")?.is_empty());
//! assert_eq!(decoder.feed(b"lo\r\n\r\n")?, vec!["data: hello", ""]);
//! # Ok::<(), tether_streaming::StreamError>(())
//! ```
//!
//! ## Example - Frame Parsing
//!
//! ```rust
//! use tether_streaming::{ParsedLine, SseFrameParser};
//!
//! let mut parser = SseFrameParser::new();
//! parser.process_line("event: ping")?;
//! parser.process_line("data: hello")?;
//!
//! match parser.process_line("")? {
//!     Some(ParsedLine::Dispatch(frame)) => {
//!         assert_eq!(frame.event_type, "ping");
//!         assert_eq!(frame.data, "hello");
//!     }
//!     other => panic!("expected a frame, got {:?}", other),
//! }
//! # Ok::<(), tether_streaming::StreamError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

/// Upper bound, in bytes, on an unterminated line and on a pending frame's data.
pub const MAX_BUFFER_SIZE: usize = 10 * 1024 * 1024;

pub mod decoder;
pub mod error;
pub mod sse;

// Re-exports
pub use decoder::{LineDecoder, LineStream};
pub use error::{StreamError, StreamResult};
pub use sse::{ParsedLine, SseFrame, SseFrameParser};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        LineDecoder, LineStream, ParsedLine, SseFrame, SseFrameParser, StreamError,
        StreamResult,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let mut decoder = LineDecoder::new();
        let mut parser = SseFrameParser::new();
        for line in decoder.feed(b"data: x\n\n").unwrap() {
            if let Some(ParsedLine::Dispatch(frame)) = parser.process_line(&line).unwrap() {
                assert_eq!(frame.data, "x");
            }
        }
    }
}
