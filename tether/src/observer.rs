//! Consumer notifications.
//!
//! A session reports three things to its consumer: ready state transitions,
//! dispatched events, and permanent failures. They are delivered in order from
//! the session's driver task through an [`EventSourceObserver`].

use crate::transport::ResponseHead;
use tether_core::{ReadyState, ServerSentEvent};
use tokio::sync::mpsc;

/// A failure after which the session will not reconnect on its own.
#[derive(Debug, Clone)]
pub struct PermanentFailure {
    /// HTTP status of the response.
    pub status: u16,
    /// The response that caused the failure.
    pub response: Option<ResponseHead>,
}

/// Receives notifications from a session.
///
/// All methods default to doing nothing. Calls are never concurrent, and a
/// state change is fully reported before the next transition begins.
pub trait EventSourceObserver: Send + 'static {
    /// The ready state moved from `old` to `new`.
    fn on_ready_state_change(&mut self, old: ReadyState, new: ReadyState) {
        let _ = (old, new);
    }

    /// An event was dispatched.
    fn on_event(&mut self, event: ServerSentEvent) {
        let _ = event;
    }

    /// The session closed because of a permanent failure.
    fn on_error(&mut self, failure: PermanentFailure) {
        let _ = failure;
    }
}

impl EventSourceObserver for Box<dyn EventSourceObserver> {
    fn on_ready_state_change(&mut self, old: ReadyState, new: ReadyState) {
        (**self).on_ready_state_change(old, new);
    }

    fn on_event(&mut self, event: ServerSentEvent) {
        (**self).on_event(event);
    }

    fn on_error(&mut self, failure: PermanentFailure) {
        (**self).on_error(failure);
    }
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EventSourceObserver for NoopObserver {}

/// One notification, as delivered by a [`ChannelObserver`].
#[derive(Debug, Clone)]
pub enum Notification {
    /// A ready state transition.
    StateChange {
        /// State before the transition.
        old: ReadyState,
        /// State after the transition.
        new: ReadyState,
    },
    /// A dispatched event.
    Event(ServerSentEvent),
    /// A permanent failure.
    Error(PermanentFailure),
}

/// An observer that forwards every notification into a channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelObserver {
    /// Create an observer and the receiver for its notifications.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::trace!("Notification receiver dropped");
        }
    }
}

impl EventSourceObserver for ChannelObserver {
    fn on_ready_state_change(&mut self, old: ReadyState, new: ReadyState) {
        self.send(Notification::StateChange { old, new });
    }

    fn on_event(&mut self, event: ServerSentEvent) {
        self.send(Notification::Event(event));
    }

    fn on_error(&mut self, failure: PermanentFailure) {
        self.send(Notification::Error(failure));
    }
}

type StateCallback = Box<dyn FnMut(ReadyState, ReadyState) + Send>;
type EventCallback = Box<dyn FnMut(ServerSentEvent) + Send>;
type ErrorCallback = Box<dyn FnMut(PermanentFailure) + Send>;

/// An observer assembled from closures. Unset slots are no-ops.
#[derive(Default)]
pub struct CallbackObserver {
    on_state: Option<StateCallback>,
    on_event: Option<EventCallback>,
    on_error: Option<ErrorCallback>,
}

impl std::fmt::Debug for CallbackObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackObserver")
            .field("on_state", &self.on_state.is_some())
            .field("on_event", &self.on_event.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl CallbackObserver {
    /// Create an observer with no callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ready state callback.
    #[must_use]
    pub fn with_state_change<F>(mut self, f: F) -> Self
    where
        F: FnMut(ReadyState, ReadyState) + Send + 'static,
    {
        self.on_state = Some(Box::new(f));
        self
    }

    /// Set the event callback.
    #[must_use]
    pub fn with_event<F>(mut self, f: F) -> Self
    where
        F: FnMut(ServerSentEvent) + Send + 'static,
    {
        self.on_event = Some(Box::new(f));
        self
    }

    /// Set the permanent failure callback.
    #[must_use]
    pub fn with_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(PermanentFailure) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl EventSourceObserver for CallbackObserver {
    fn on_ready_state_change(&mut self, old: ReadyState, new: ReadyState) {
        if let Some(f) = self.on_state.as_mut() {
            f(old, new);
        }
    }

    fn on_event(&mut self, event: ServerSentEvent) {
        if let Some(f) = self.on_event.as_mut() {
            f(event);
        }
    }

    fn on_error(&mut self, failure: PermanentFailure) {
        if let Some(f) = self.on_error.as_mut() {
            f(failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tether_core::EventSourceId;

    fn event(data: &str) -> ServerSentEvent {
        ServerSentEvent::new(EventSourceId::new(), "message", data, "https://a.test", "")
    }

    #[test]
    fn test_callback_observer_unset_slots_are_inert() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut observer = CallbackObserver::new().with_event(move |e| {
            sink.lock().unwrap().push(e.data);
        });

        observer.on_ready_state_change(ReadyState::Closed, ReadyState::Connecting);
        observer.on_event(event("one"));
        observer.on_error(PermanentFailure {
            status: 404,
            response: None,
        });

        assert_eq!(*seen.lock().unwrap(), vec!["one".to_string()]);
    }

    #[test]
    fn test_callback_observer_routes_each_notification() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (states, events, errors) = (Arc::clone(&log), Arc::clone(&log), Arc::clone(&log));
        let mut observer = CallbackObserver::new()
            .with_state_change(move |old, new| states.lock().unwrap().push(format!("{old}->{new}")))
            .with_event(move |e| events.lock().unwrap().push(e.data))
            .with_error(move |f| errors.lock().unwrap().push(f.status.to_string()));

        observer.on_ready_state_change(ReadyState::Connecting, ReadyState::Open);
        observer.on_event(event("hi"));
        observer.on_error(PermanentFailure {
            status: 410,
            response: None,
        });

        assert_eq!(*log.lock().unwrap(), vec!["CONNECTING->OPEN", "hi", "410"]);
    }

    #[test]
    fn test_channel_observer_preserves_order() {
        let (mut observer, mut rx) = ChannelObserver::new();
        observer.on_ready_state_change(ReadyState::Connecting, ReadyState::Open);
        observer.on_event(event("x"));

        assert!(matches!(
            rx.try_recv(),
            Ok(Notification::StateChange {
                old: ReadyState::Connecting,
                new: ReadyState::Open
            })
        ));
        assert!(matches!(rx.try_recv(), Ok(Notification::Event(e)) if e.data == "x"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (mut observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_event(event("lost"));
    }

    #[test]
    fn test_boxed_observer() {
        let (observer, mut rx) = ChannelObserver::new();
        let mut boxed: Box<dyn EventSourceObserver> = Box::new(observer);
        boxed.on_error(PermanentFailure {
            status: 401,
            response: None,
        });
        assert!(matches!(rx.try_recv(), Ok(Notification::Error(f)) if f.status == 401));
    }
}
