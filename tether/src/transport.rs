//! HTTP transport abstraction.
//!
//! The driver never talks to the network directly. Each connection attempt hands
//! a fully built [`SseRequest`] to a [`Transport`] and reads the returned body
//! stream. [`ReqwestTransport`] is the production implementation.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method};
use std::time::Duration;
use tether_retries::parse_retry_after;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Media type every successful response must declare.
pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or no response arrived.
    #[error("Request failed: {0}")]
    Request(String),

    /// Reading the response body failed.
    #[error("Body read failed: {0}")]
    Body(String),

    /// The attempt was cancelled.
    #[error("Request aborted")]
    Aborted,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// A GET request for an event stream.
///
/// Responses must never be served from a cache.
#[derive(Debug, Clone)]
pub struct SseRequest {
    /// Target URL.
    pub url: Url,
    /// Complete request headers.
    pub headers: HeaderMap,
    /// Cancelled when the attempt is aborted.
    pub cancel: CancellationToken,
}

impl SseRequest {
    /// The request method, always GET.
    #[must_use]
    pub fn method(&self) -> Method {
        Method::GET
    }
}

/// Status line and headers of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// HTTP status code.
    pub status: u16,
    /// Final URL after redirects.
    pub url: Url,
    /// Response headers.
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// The `Content-Type` header, if present and valid text.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Whether the response declares an event stream.
    ///
    /// Parameters after `;` are ignored.
    #[must_use]
    pub fn is_event_stream(&self) -> bool {
        self.content_type().is_some_and(is_event_stream_type)
    }

    /// Whether this response opens a stream: status 200 and an event stream.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == 200 && self.is_event_stream()
    }

    /// ASCII serialization of the final URL's origin.
    #[must_use]
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Server's `Retry-After` hint.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(&self.headers)
    }
}

fn is_event_stream_type(value: &str) -> bool {
    value
        .strip_prefix(EVENT_STREAM_MIME)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(';'))
}

/// Response body as a stream of chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// A response whose body has not been read yet.
pub struct TransportResponse {
    /// Status line and headers.
    pub head: ResponseHead,
    /// Body chunks.
    pub body: BodyStream,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// Issues event stream requests.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send the request and return once response headers have arrived.
    ///
    /// # Errors
    ///
    /// Returns an error if no response was received. The caller treats every
    /// error as a network failure.
    async fn fetch(&self, request: SseRequest) -> Result<TransportResponse, TransportError>;
}

/// Transport backed by a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, request: SseRequest) -> Result<TransportResponse, TransportError> {
        debug!(url = %request.url, "Sending event stream request");

        let response = self
            .client
            .request(request.method(), request.url)
            .headers(request.headers)
            .send()
            .await?;

        let head = ResponseHead {
            status: response.status().as_u16(),
            url: response.url().clone(),
            headers: response.headers().clone(),
        };
        let body = response.bytes_stream().map_err(TransportError::from).boxed();

        Ok(TransportResponse { head, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, ACCEPT, RETRY_AFTER};
    use rstest::rstest;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn head_with(status: u16, content_type: Option<&'static str>) -> ResponseHead {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        ResponseHead {
            status,
            url: Url::parse("https://events.example.com:8443/a/b?c").unwrap(),
            headers,
        }
    }

    #[rstest]
    #[case(Some("text/event-stream"), true)]
    #[case(Some("text/event-stream;charset=utf-8"), true)]
    #[case(Some("text/event-stream; charset=utf-8"), true)]
    #[case(Some("text/event-streams"), false)]
    #[case(Some("text/plain"), false)]
    #[case(Some("application/json"), false)]
    #[case(None, false)]
    fn test_is_event_stream(#[case] content_type: Option<&'static str>, #[case] expected: bool) {
        assert_eq!(head_with(200, content_type).is_event_stream(), expected);
    }

    #[test]
    fn test_is_success_requires_200() {
        assert!(head_with(200, Some("text/event-stream")).is_success());
        assert!(!head_with(201, Some("text/event-stream")).is_success());
        assert!(!head_with(200, Some("text/plain")).is_success());
    }

    #[test]
    fn test_origin() {
        assert_eq!(
            head_with(200, None).origin(),
            "https://events.example.com:8443"
        );
    }

    #[test]
    fn test_retry_after() {
        let mut head = head_with(503, None);
        head.headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(head.retry_after(), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_reqwest_transport_streams_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(header("accept", "text/event-stream"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("data: hi\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        let request = SseRequest {
            url: Url::parse(&format!("{}/events", server.uri())).unwrap(),
            headers,
            cancel: CancellationToken::new(),
        };

        let response = ReqwestTransport::new().fetch(request).await.unwrap();
        assert!(response.head.is_success());
        assert_eq!(response.head.origin(), server.uri());

        let body: Vec<Bytes> = response.body.try_collect().await.unwrap();
        assert_eq!(body.concat(), b"data: hi\n\n");
    }

    #[tokio::test]
    async fn test_reqwest_transport_connection_refused() {
        // Bind and drop a listener so nothing accepts on the port
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let request = SseRequest {
            url: Url::parse(&format!("http://127.0.0.1:{port}/events")).unwrap(),
            headers: HeaderMap::new(),
            cancel: CancellationToken::new(),
        };

        let err = ReqwestTransport::new().fetch(request).await.unwrap_err();
        assert!(matches!(err, TransportError::Request(_)));
    }
}
