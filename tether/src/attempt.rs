//! A single connection attempt.
//!
//! Each attempt runs in its own task. It owns the frame parser for its stream
//! and reports back to the driver through tagged [`AttemptMessage`]s, so a
//! superseded attempt can keep running briefly without affecting the session.

use crate::config::EventSourceConfig;
use crate::transport::{
    ResponseHead, SseRequest, Transport, TransportError, TransportResponse, EVENT_STREAM_MIME,
};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tether_streaming::{
    LineStream, ParsedLine, SseFrame, SseFrameParser, StreamError, StreamResult,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

/// Identifies one attempt within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct AttemptId(pub(crate) u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Progress reported by an attempt, in the order it happened.
#[derive(Debug)]
pub(crate) enum AttemptMessage {
    /// The response is an event stream; lines follow.
    Opened { id: AttemptId, origin: String },
    /// A body chunk arrived.
    Activity { id: AttemptId },
    /// The stream declared a minimum reconnection delay.
    Retry { id: AttemptId, delay: Duration },
    /// A frame was flushed.
    Frame { id: AttemptId, frame: SseFrame },
    /// The attempt is over. Always the last message.
    Finished {
        id: AttemptId,
        network_error: bool,
        status: u16,
        response: Option<ResponseHead>,
    },
}

impl AttemptMessage {
    pub(crate) fn id(&self) -> AttemptId {
        match self {
            Self::Opened { id, .. }
            | Self::Activity { id }
            | Self::Retry { id, .. }
            | Self::Frame { id, .. }
            | Self::Finished { id, .. } => *id,
        }
    }
}

/// Build the request for a new attempt.
///
/// `Last-Event-ID` carries the session's last known ID. Headers from the config
/// replace defaults of the same name.
pub(crate) fn build_request(
    config: &EventSourceConfig,
    last_event_id: &str,
    cancel: CancellationToken,
) -> SseRequest {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM_MIME));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    if !last_event_id.is_empty() {
        match HeaderValue::from_str(last_event_id) {
            Ok(value) => {
                headers.insert(LAST_EVENT_ID, value);
            }
            Err(_) => warn!(
                last_event_id,
                "Last event ID is not a valid header value, not sending it"
            ),
        }
    }

    for name in config.headers().keys() {
        headers.remove(name);
    }
    for (name, value) in config.headers() {
        headers.append(name.clone(), value.clone());
    }

    SseRequest {
        url: config.url().clone(),
        headers,
        cancel,
    }
}

struct Reporter {
    id: AttemptId,
    tx: UnboundedSender<AttemptMessage>,
}

impl Reporter {
    /// Returns false once the driver is gone.
    fn send(&self, message: AttemptMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    fn finish(&self, network_error: bool, status: u16, response: Option<ResponseHead>) {
        let _ = self.send(AttemptMessage::Finished {
            id: self.id,
            network_error,
            status,
            response,
        });
    }
}

/// Run one attempt to completion.
pub(crate) async fn run_attempt(
    transport: Arc<dyn Transport>,
    request: SseRequest,
    id: AttemptId,
    tx: UnboundedSender<AttemptMessage>,
) {
    let cancel = request.cancel.clone();
    let reporter = Reporter { id, tx };

    let fetched = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TransportError::Aborted),
        result = transport.fetch(request) => result,
    };

    let TransportResponse { head, body } = match fetched {
        Ok(response) => response,
        Err(err) => {
            debug!(attempt = %id, error = %err, "Request failed");
            reporter.finish(true, 0, None);
            return;
        }
    };

    if !head.is_success() {
        debug!(
            attempt = %id,
            status = head.status,
            content_type = head.content_type().unwrap_or(""),
            "Response is not an event stream"
        );
        cancel.cancel();
        reporter.finish(false, head.status, Some(head));
        return;
    }

    if !reporter.send(AttemptMessage::Opened {
        id,
        origin: head.origin(),
    }) {
        return;
    }

    let activity = reporter.tx.clone();
    let mut lines = LineStream::new(body, move || {
        let _ = activity.send(AttemptMessage::Activity { id });
    });
    let mut parser = SseFrameParser::new();

    let outcome: StreamResult<()> = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break Err(StreamError::Aborted),
            next = lines.next() => next,
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(err)) => break Err(err),
            None => break Ok(()),
        };

        let message = match parser.process_line(&line) {
            Ok(Some(ParsedLine::Dispatch(frame))) => AttemptMessage::Frame { id, frame },
            Ok(Some(ParsedLine::Retry(ms))) => AttemptMessage::Retry {
                id,
                delay: Duration::from_millis(ms),
            },
            Ok(None) => continue,
            Err(err) => break Err(err),
        };
        if !reporter.send(message) {
            trace!(attempt = %id, "Driver gone, abandoning stream");
            return;
        }
    };

    match outcome {
        Ok(()) => debug!(attempt = %id, "Server closed the stream"),
        Err(err) if err.is_aborted() => debug!(attempt = %id, "Stream aborted"),
        Err(StreamError::BufferOverflow) => {
            warn!(attempt = %id, "Server sent too much without a line or frame break");
        }
        Err(err) => debug!(attempt = %id, error = %err, "Stream broke"),
    }

    // An open stream that ends for any reason is reopened
    reporter.finish(true, head.status, Some(head));
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use reqwest::header::CONTENT_TYPE;
    use tokio::sync::mpsc;
    use url::Url;

    fn config() -> EventSourceConfig {
        EventSourceConfig::new("https://events.test/stream").unwrap()
    }

    #[test]
    fn test_default_headers() {
        let request = build_request(&config(), "", CancellationToken::new());

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.headers[ACCEPT], "text/event-stream");
        assert_eq!(request.headers[CACHE_CONTROL], "no-store");
        assert!(!request.headers.contains_key("last-event-id"));
        assert_eq!(request.url.as_str(), "https://events.test/stream");
    }

    #[test]
    fn test_last_event_id_header() {
        let request = build_request(&config(), "42", CancellationToken::new());
        assert_eq!(request.headers["last-event-id"], "42");
    }

    #[test]
    fn test_invalid_last_event_id_is_skipped() {
        let request = build_request(&config(), "bad\nid", CancellationToken::new());
        assert!(!request.headers.contains_key("last-event-id"));
    }

    #[test]
    fn test_config_headers_override_defaults() {
        let config = EventSourceConfig::builder("https://events.test/stream")
            .header("Authorization", "Bearer t")
            .header("Accept", "text/event-stream, */*")
            .build()
            .unwrap();
        let request = build_request(&config, "", CancellationToken::new());

        assert_eq!(request.headers["authorization"], "Bearer t");
        let accept: Vec<_> = request.headers.get_all(ACCEPT).iter().collect();
        assert_eq!(accept, vec!["text/event-stream, */*"]);
    }

    struct OneShot {
        response: Mutex<Option<Result<TransportResponse, TransportError>>>,
    }

    impl OneShot {
        fn new(response: Result<TransportResponse, TransportError>) -> Arc<dyn Transport> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
            })
        }
    }

    #[async_trait]
    impl Transport for OneShot {
        async fn fetch(&self, _request: SseRequest) -> Result<TransportResponse, TransportError> {
            self.response
                .lock()
                .take()
                .unwrap_or(Err(TransportError::Request("exhausted".into())))
        }
    }

    fn response(
        status: u16,
        content_type: &'static str,
        chunks: &[&'static str],
    ) -> TransportResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        let body: Vec<Result<Bytes, TransportError>> =
            chunks.iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))).collect();
        TransportResponse {
            head: ResponseHead {
                status,
                url: Url::parse("https://cdn.events.test/final").unwrap(),
                headers,
            },
            body: stream::iter(body).boxed(),
        }
    }

    async fn run(transport: Arc<dyn Transport>) -> Vec<AttemptMessage> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = build_request(&config(), "", CancellationToken::new());
        run_attempt(transport, request, AttemptId(3), tx).await;

        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn test_stream_reports_in_order() {
        let transport = OneShot::new(Ok(response(
            200,
            "text/event-stream",
            &["retry: 100\nid: 1\nda", "ta: a\n\n"],
        )));
        let messages = run(transport).await;

        assert!(matches!(&messages[0], AttemptMessage::Opened { origin, .. } if origin == "https://cdn.events.test"));
        assert!(matches!(messages[1], AttemptMessage::Activity { .. }));
        assert!(matches!(messages[2], AttemptMessage::Retry { delay, .. } if delay == Duration::from_millis(100)));
        assert!(matches!(messages[3], AttemptMessage::Activity { .. }));
        assert!(matches!(&messages[4], AttemptMessage::Frame { frame, .. } if frame.data == "a" && frame.last_event_id == "1"));
        assert!(matches!(
            messages[5],
            AttemptMessage::Finished {
                network_error: true,
                status: 200,
                ..
            }
        ));
        assert_eq!(messages.len(), 6);
        assert!(messages.iter().all(|m| m.id() == AttemptId(3)));
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_not_streamed() {
        let transport = OneShot::new(Ok(response(200, "text/plain", &["data: x\n\n"])));
        let messages = run(transport).await;

        assert_eq!(messages.len(), 1);
        assert!(matches!(
            messages[0],
            AttemptMessage::Finished {
                network_error: false,
                status: 200,
                response: Some(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_request_error_is_network_error() {
        let transport = OneShot::new(Err(TransportError::Request("refused".into())));
        let messages = run(transport).await;

        assert!(matches!(
            messages[..],
            [AttemptMessage::Finished {
                network_error: true,
                status: 0,
                response: None,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_endless_line_ends_attempt_as_network_error() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        let chunk = Bytes::from(vec![b'x'; 1024 * 1024]);
        // Never terminates a line and never ends on its own
        let body = stream::repeat_with(move || Ok::<_, TransportError>(chunk.clone()))
            .take(16)
            .chain(stream::pending());
        let transport = OneShot::new(Ok(TransportResponse {
            head: ResponseHead {
                status: 200,
                url: Url::parse("https://events.test/stream").unwrap(),
                headers,
            },
            body: body.boxed(),
        }));

        let messages = run(transport).await;
        assert!(matches!(messages[0], AttemptMessage::Opened { .. }));
        assert!(matches!(
            messages.last(),
            Some(AttemptMessage::Finished {
                network_error: true,
                status: 200,
                ..
            })
        ));
        assert!(!messages
            .iter()
            .any(|m| matches!(m, AttemptMessage::Frame { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_before_response() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = build_request(&config(), "", cancel);

        let transport = OneShot::new(Ok(response(200, "text/event-stream", &[])));
        run_attempt(transport, request, AttemptId(1), tx).await;

        assert!(matches!(
            rx.try_recv(),
            Ok(AttemptMessage::Finished {
                network_error: true,
                status: 0,
                ..
            })
        ));
    }
}
