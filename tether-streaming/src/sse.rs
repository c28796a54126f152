//! Server-Sent Events (SSE) frame parsing.
//!
//! This module accumulates decoded lines into dispatchable frames. A blank line
//! flushes the pending frame; lines starting with `:` are comments.

use crate::error::{StreamError, StreamResult};
use crate::MAX_BUFFER_SIZE;
use tether_core::DEFAULT_EVENT_TYPE;

/// A complete frame, ready to be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event type (`"message"` if unspecified).
    pub event_type: String,
    /// Event data, with the final line terminator stripped.
    pub data: String,
    /// The last event ID seen by this parser when the frame was flushed.
    pub last_event_id: String,
}

/// The effect of one processed line that the caller has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// A valid `retry:` field, in milliseconds.
    Retry(u64),
    /// A blank line flushed a non-empty frame.
    Dispatch(SseFrame),
}

/// Parser for Server-Sent Events lines.
///
/// One parser belongs to one connection attempt. The last event ID is kept
/// across frames, while the event type and data are cleared on every blank line.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    event_type: String,
    data: String,
    last_event_id: String,
}

impl SseFrameParser {
    /// Create a new SSE parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a single line (without its terminator).
    ///
    /// Returns `None` for comments, unknown fields, ignored `retry` values and
    /// blank lines that have nothing to flush.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::BufferOverflow`] if the pending data would grow
    /// past [`MAX_BUFFER_SIZE`]. The pending frame is discarded.
    pub fn process_line(&mut self, line: &str) -> StreamResult<Option<ParsedLine>> {
        if is_blank(line) {
            return Ok(self.flush().map(ParsedLine::Dispatch));
        }

        let (field, value) = match line.find(':') {
            // Comment
            Some(0) => return Ok(None),
            Some(colon) => {
                let value = &line[colon + 1..];
                (&line[..colon], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => {
                self.event_type.clear();
                self.event_type.push_str(value);
            }
            "data" => {
                if self.data.len() + value.len() + 1 > MAX_BUFFER_SIZE {
                    self.event_type.clear();
                    self.data.clear();
                    return Err(StreamError::BufferOverflow);
                }
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                self.last_event_id.clear();
                self.last_event_id.push_str(value);
            }
            "retry" => return Ok(parse_retry(value).map(ParsedLine::Retry)),
            _ => {}
        }

        Ok(None)
    }

    fn flush(&mut self) -> Option<SseFrame> {
        let event_type = std::mem::take(&mut self.event_type);
        let mut data = std::mem::take(&mut self.data);

        if data.is_empty() {
            return None;
        }
        if data.ends_with('\n') {
            data.pop();
        }

        Some(SseFrame {
            event_type: if event_type.is_empty() {
                DEFAULT_EVENT_TYPE.to_string()
            } else {
                event_type
            },
            data,
            last_event_id: self.last_event_id.clone(),
        })
    }
}

/// A line with nothing but whitespace, counting U+FEFF as whitespace.
fn is_blank(line: &str) -> bool {
    line.chars().all(|c| c.is_whitespace() || c == '\u{feff}')
}

/// Parse a `retry:` value. Only plain ASCII digits are accepted.
fn parse_retry(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // All digits, so the only failure is overflow
    Some(value.parse().unwrap_or(u64::MAX))
}
