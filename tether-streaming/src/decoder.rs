//! Incremental line decoding.
//!
//! Bytes arrive in chunks that may split lines, and even multi-byte UTF-8
//! sequences, at any position. [`LineDecoder`] carries partial state between
//! chunks so that the lines it yields do not depend on how the body was
//! fragmented.

use crate::error::{StreamError, StreamResult};
use crate::MAX_BUFFER_SIZE;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Streaming UTF-8 line decoder.
///
/// Lines end at `\r\n`, `\r` or `\n`. A trailing fragment with no terminator is
/// held until more bytes arrive and is dropped if the stream ends first. The
/// fragment may not grow past [`MAX_BUFFER_SIZE`].
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Bytes of an incomplete UTF-8 sequence at the end of the last chunk.
    partial: Vec<u8>,
    /// Text of the current, unterminated line.
    remainder: String,
    /// Whether any text has been decoded yet (for the byte order mark).
    seen_text: bool,
    /// The previous chunk ended in `\r`, so a leading `\n` belongs to it.
    after_cr: bool,
}

impl LineDecoder {
    /// Create a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk and return every line it completes.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::BufferOverflow`] when the unterminated line gets
    /// too long.
    pub fn feed(&mut self, chunk: &[u8]) -> StreamResult<Vec<String>> {
        let mut text = self.decode(chunk);

        if !self.seen_text && !text.is_empty() {
            if text.starts_with(BYTE_ORDER_MARK) {
                text.replace_range(..BYTE_ORDER_MARK.len_utf8(), "");
            }
            self.seen_text = true;
        }

        let lines = self.split_lines(&text);
        if self.remainder.len() > MAX_BUFFER_SIZE {
            return Err(StreamError::BufferOverflow);
        }
        Ok(lines)
    }

    /// The unterminated text carried into the next chunk.
    #[must_use]
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    fn decode(&mut self, chunk: &[u8]) -> String {
        self.partial.extend_from_slice(chunk);

        let mut text = String::with_capacity(self.partial.len());
        let mut input = self.partial.as_slice();

        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    text.push_str(valid);
                    input = &[];
                    break;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    // valid_up_to guarantees this prefix decodes
                    text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }

        let carried = input.to_vec();
        self.partial = carried;
        text
    }

    fn split_lines(&mut self, text: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = text;

        if self.after_cr && !rest.is_empty() {
            rest = rest.strip_prefix('\n').unwrap_or(rest);
            self.after_cr = false;
        }

        while let Some(index) = rest.find(|c| c == '\r' || c == '\n') {
            let mut line = std::mem::take(&mut self.remainder);
            line.push_str(&rest[..index]);
            lines.push(line);

            let terminator = &rest[index..];
            if terminator.starts_with("\r\n") {
                rest = &rest[index + 2..];
            } else {
                if terminator.starts_with('\r') && index + 1 == rest.len() {
                    self.after_cr = true;
                }
                rest = &rest[index + 1..];
            }
        }

        self.remainder.push_str(rest);
        lines
    }
}

pin_project! {
    /// Stream adapter that yields text lines from a byte stream.
    ///
    /// `on_chunk` runs for every chunk received, before any line it contains is
    /// yielded and even when it completes no line. The stream ends after the
    /// first error, whether it came from the body or from an overlong line.
    pub struct LineStream<S, F> {
        #[pin]
        inner: S,
        decoder: LineDecoder,
        lines: VecDeque<String>,
        on_chunk: F,
        finished: bool,
    }
}

impl<S, F, E> LineStream<S, F>
where
    S: Stream<Item = Result<Bytes, E>>,
    F: FnMut(),
{
    /// Create a new line stream from a byte stream.
    pub fn new(inner: S, on_chunk: F) -> Self {
        Self {
            inner,
            decoder: LineDecoder::new(),
            lines: VecDeque::new(),
            on_chunk,
            finished: false,
        }
    }
}

impl<S, F, E> Stream for LineStream<S, F>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
    F: FnMut(),
{
    type Item = StreamResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            // Return buffered lines first
            if let Some(line) = this.lines.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }

            if *this.finished {
                return Poll::Ready(None);
            }

            match this.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    (this.on_chunk)();
                    match this.decoder.feed(&bytes) {
                        Ok(lines) => this.lines.extend(lines),
                        Err(e) => {
                            *this.finished = true;
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(StreamError::from_err(e))));
                }
                Poll::Ready(None) => {
                    *this.finished = true;
                    if !this.decoder.remainder().is_empty() {
                        tracing::trace!(
                            len = this.decoder.remainder().len(),
                            "Dropping unterminated trailing line"
                        );
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
