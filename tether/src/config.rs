//! Event source configuration.
//!
//! A config is validated once, when it is built, and never changes afterwards.
//! Everything that does change during a session lives in the driver.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tether_core::{Result, TetherError};
use tether_retries::BackoffConfig;
use url::Url;

/// Abort a connection that has delivered no bytes for this long.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(360);

/// Window in which bursts of connection-change signals collapse into one.
pub const DEFAULT_CONNECTIVITY_DEBOUNCE: Duration = Duration::from_millis(50);

/// Immutable configuration for an [`EventSource`](crate::EventSource).
#[derive(Debug, Clone)]
pub struct EventSourceConfig {
    url: Url,
    headers: HeaderMap,
    last_event_id: String,
    inactivity_timeout: Duration,
    connectivity_debounce: Duration,
    backoff: BackoffConfig,
}

impl EventSourceConfig {
    /// Create a config with defaults for everything but the URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or not http(s).
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        Self::builder(url).build()
    }

    /// Create a builder.
    #[must_use]
    pub fn builder(url: impl AsRef<str>) -> EventSourceConfigBuilder {
        EventSourceConfigBuilder::new(url)
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Extra request headers, applied over the defaults.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Last event ID sent on the first connection.
    #[must_use]
    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    /// Inactivity timeout.
    #[must_use]
    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }

    /// Debounce window for connection-change signals.
    #[must_use]
    pub fn connectivity_debounce(&self) -> Duration {
        self.connectivity_debounce
    }

    /// Reconnection backoff tuning.
    #[must_use]
    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }
}

/// Builder for [`EventSourceConfig`].
///
/// Validation is deferred to [`build`](Self::build) so calls can be chained.
#[derive(Debug, Clone)]
pub struct EventSourceConfigBuilder {
    url: String,
    headers: Vec<(String, String)>,
    header_map: HeaderMap,
    last_event_id: String,
    inactivity_timeout: Duration,
    connectivity_debounce: Duration,
    backoff: BackoffConfig,
}

impl EventSourceConfigBuilder {
    /// Create a builder for the given URL.
    #[must_use]
    pub fn new(url: impl AsRef<str>) -> Self {
        Self {
            url: url.as_ref().to_string(),
            headers: Vec::new(),
            header_map: HeaderMap::new(),
            last_event_id: String::new(),
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            connectivity_debounce: DEFAULT_CONNECTIVITY_DEBOUNCE,
            backoff: BackoffConfig::default(),
        }
    }

    /// Add a request header, e.g. `Authorization`.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add already-validated request headers.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.header_map.extend(headers);
        self
    }

    /// Set the last event ID to send on the first connection.
    #[must_use]
    pub fn last_event_id(mut self, id: impl Into<String>) -> Self {
        self.last_event_id = id.into();
        self
    }

    /// Set the inactivity timeout.
    #[must_use]
    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Set the connection-change debounce window.
    #[must_use]
    pub fn connectivity_debounce(mut self, window: Duration) -> Self {
        self.connectivity_debounce = window;
        self
    }

    /// Set the backoff tuning.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Validate and build the config.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or is not http(s), a header
    /// name or value is invalid, or the inactivity timeout is zero.
    pub fn build(self) -> Result<EventSourceConfig> {
        let url = Url::parse(&self.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TetherError::UnsupportedScheme(url.scheme().to_string()));
        }

        if self.inactivity_timeout.is_zero() {
            return Err(TetherError::config("inactivity timeout must be positive"));
        }

        let mut headers = self.header_map;
        for (name, value) in self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TetherError::invalid_header(&name, e))?;
            let header_value =
                HeaderValue::from_str(&value).map_err(|e| TetherError::invalid_header(&name, e))?;
            headers.append(header_name, header_value);
        }

        Ok(EventSourceConfig {
            url,
            headers,
            last_event_id: self.last_event_id,
            inactivity_timeout: self.inactivity_timeout,
            connectivity_debounce: self.connectivity_debounce,
            backoff: self.backoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EventSourceConfig::new("https://example.com/events").unwrap();

        assert_eq!(config.url().as_str(), "https://example.com/events");
        assert!(config.headers().is_empty());
        assert_eq!(config.last_event_id(), "");
        assert_eq!(config.inactivity_timeout(), Duration::from_millis(360_000));
        assert_eq!(config.connectivity_debounce(), Duration::from_millis(50));
        assert_eq!(config.backoff(), &BackoffConfig::default());
    }

    #[test]
    fn test_builder() {
        let config = EventSourceConfig::builder("http://localhost:8080/stream")
            .header("Authorization", "Bearer token")
            .last_event_id("41")
            .inactivity_timeout(Duration::from_secs(30))
            .build()
            .unwrap();

        assert_eq!(config.headers()["authorization"], "Bearer token");
        assert_eq!(config.last_event_id(), "41");
        assert_eq!(config.inactivity_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_url() {
        let err = EventSourceConfig::new("not a url").unwrap_err();
        assert!(matches!(err, TetherError::InvalidUrl(_)));
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = EventSourceConfig::new("ftp://example.com/").unwrap_err();
        assert!(matches!(err, TetherError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[test]
    fn test_invalid_header() {
        let err = EventSourceConfig::builder("https://example.com")
            .header("Bad Header", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, TetherError::InvalidHeader { name, .. } if name == "Bad Header"));

        let err = EventSourceConfig::builder("https://example.com")
            .header("X-Ok", "line\nbreak")
            .build()
            .unwrap_err();
        assert!(matches!(err, TetherError::InvalidHeader { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = EventSourceConfig::builder("https://example.com")
            .inactivity_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, TetherError::Config(_)));
    }
}
