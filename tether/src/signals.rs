//! Platform connectivity and visibility signals.
//!
//! The network monitor never reads global platform state. A [`PlatformSignals`]
//! implementation is injected instead, so that hosts can forward their own
//! notifications and tests can emit synthetic ones.

use futures::channel::mpsc;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A notification from the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformSignal {
    /// The application was shown or hidden. Often follows a wake from sleep.
    VisibilityChange,
    /// The device reported it is online.
    Online,
    /// The device reported it is offline.
    Offline,
    /// The active network changed in some unspecified way.
    ConnectionChange,
}

/// Which kind of connectivity notification to subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivitySource {
    /// Explicit [`PlatformSignal::Online`] and [`PlatformSignal::Offline`].
    OnlineOffline,
    /// Generic [`PlatformSignal::ConnectionChange`].
    ConnectionChange,
}

/// A stream of platform signals.
pub type SignalStream = BoxStream<'static, PlatformSignal>;

/// Capabilities of the host platform.
///
/// Subscriptions end when the returned stream is dropped.
pub trait PlatformSignals: Send + Sync {
    /// Whether the device may currently be online.
    fn is_online(&self) -> bool;

    /// Whether online/offline transitions are reported.
    fn supports_online_events(&self) -> bool;

    /// Whether generic connection changes are reported.
    fn supports_connection_change(&self) -> bool;

    /// Subscribe to visibility changes.
    fn subscribe_visibility(&self) -> SignalStream;

    /// Subscribe to connectivity changes from the given source.
    fn subscribe_connectivity(&self, source: ConnectivitySource) -> SignalStream;
}

impl<P: PlatformSignals + ?Sized> PlatformSignals for Arc<P> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }

    fn supports_online_events(&self) -> bool {
        (**self).supports_online_events()
    }

    fn supports_connection_change(&self) -> bool {
        (**self).supports_connection_change()
    }

    fn subscribe_visibility(&self) -> SignalStream {
        (**self).subscribe_visibility()
    }

    fn subscribe_connectivity(&self, source: ConnectivitySource) -> SignalStream {
        (**self).subscribe_connectivity(source)
    }
}

/// A platform that reports nothing and is always online.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignals;

impl PlatformSignals for NoSignals {
    fn is_online(&self) -> bool {
        true
    }

    fn supports_online_events(&self) -> bool {
        false
    }

    fn supports_connection_change(&self) -> bool {
        false
    }

    fn subscribe_visibility(&self) -> SignalStream {
        stream::pending().boxed()
    }

    fn subscribe_connectivity(&self, _source: ConnectivitySource) -> SignalStream {
        stream::pending().boxed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topic {
    Visibility,
    Connectivity(ConnectivitySource),
}

#[derive(Debug)]
struct ManualInner {
    online: AtomicBool,
    online_events: bool,
    subscribers: Mutex<Vec<(Topic, mpsc::UnboundedSender<PlatformSignal>)>>,
}

/// A platform whose signals are emitted by hand.
///
/// Clones share state, so one clone can be handed to an event source while
/// another is used to emit signals.
#[derive(Debug, Clone)]
pub struct ManualSignals {
    inner: Arc<ManualInner>,
}

impl Default for ManualSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualSignals {
    /// A platform that reports online/offline transitions and connection changes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_online_events(true)
    }

    /// A platform that only reports generic connection changes.
    #[must_use]
    pub fn connection_change_only() -> Self {
        Self::with_online_events(false)
    }

    fn with_online_events(online_events: bool) -> Self {
        Self {
            inner: Arc::new(ManualInner {
                online: AtomicBool::new(true),
                online_events,
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Change the online flag.
    ///
    /// Emits [`PlatformSignal::Online`] or [`PlatformSignal::Offline`] when the
    /// platform reports online events.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
        if self.inner.online_events {
            let signal = if online {
                PlatformSignal::Online
            } else {
                PlatformSignal::Offline
            };
            self.emit(Topic::Connectivity(ConnectivitySource::OnlineOffline), signal);
        }
    }

    /// Emit a visibility change.
    pub fn emit_visibility_change(&self) {
        self.emit(Topic::Visibility, PlatformSignal::VisibilityChange);
    }

    /// Emit a generic connection change.
    pub fn emit_connection_change(&self) {
        self.emit(
            Topic::Connectivity(ConnectivitySource::ConnectionChange),
            PlatformSignal::ConnectionChange,
        );
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|(_, tx)| !tx.is_closed());
        subscribers.len()
    }

    fn emit(&self, topic: Topic, signal: PlatformSignal) {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|(t, tx)| *t != topic || tx.unbounded_send(signal).is_ok());
    }

    fn subscribe(&self, topic: Topic) -> SignalStream {
        let (tx, rx) = mpsc::unbounded();
        self.inner.subscribers.lock().push((topic, tx));
        rx.boxed()
    }
}

impl PlatformSignals for ManualSignals {
    fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    fn supports_online_events(&self) -> bool {
        self.inner.online_events
    }

    fn supports_connection_change(&self) -> bool {
        true
    }

    fn subscribe_visibility(&self) -> SignalStream {
        self.subscribe(Topic::Visibility)
    }

    fn subscribe_connectivity(&self, source: ConnectivitySource) -> SignalStream {
        self.subscribe(Topic::Connectivity(source))
    }
}
