//! `Retry-After` header parsing.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Parse a `Retry-After` header given in whole seconds.
///
/// Only positive integers count; HTTP dates, zero and garbage yield `None`.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
