//! Network and visibility monitor.
//!
//! While a session is open the monitor listens for visibility changes and for
//! one kind of connectivity notification, preferring explicit online/offline
//! transitions over generic connection changes. Connection changes arrive in
//! bursts on most platforms and are debounced before they are handed on.

use crate::signals::{ConnectivitySource, PlatformSignal, PlatformSignals, SignalStream};
use futures::stream::SelectAll;
use futures::StreamExt;
use std::pin::Pin;
use std::time::Duration;
use tether_core::ReadyState;
use tokio::time::{sleep, Sleep};
use tracing::debug;

/// What the state machine should do in response to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    /// Nothing to do.
    Ignore,
    /// Abort the current attempt; the connection may be dead.
    AbortAttempt,
    /// Cancel the pending reconnect and start an attempt now.
    RetryNow,
}

/// Decide how to react to a signal.
///
/// `deadline_passed` reports whether the inactivity deadline of the current
/// attempt is already behind us, which after a visibility change means the
/// device was probably asleep.
#[must_use]
pub fn decide(
    signal: PlatformSignal,
    ready_state: ReadyState,
    may_be_online: bool,
    deadline_passed: bool,
) -> MonitorAction {
    if signal == PlatformSignal::VisibilityChange && !deadline_passed {
        return MonitorAction::Ignore;
    }

    match ready_state {
        // A generic change while online tells us nothing new
        ReadyState::Connecting | ReadyState::Open => {
            if !may_be_online || signal != PlatformSignal::ConnectionChange {
                MonitorAction::AbortAttempt
            } else {
                MonitorAction::Ignore
            }
        }
        ReadyState::Waiting if may_be_online => MonitorAction::RetryNow,
        _ => MonitorAction::Ignore,
    }
}

/// Registered subscriptions for one open session.
///
/// Dropping the monitor drops every subscription.
pub struct NetworkMonitor {
    streams: SelectAll<SignalStream>,
    debounce: Duration,
    pending_change: Option<Pin<Box<Sleep>>>,
    source: Option<ConnectivitySource>,
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("subscriptions", &self.streams.len())
            .field("debounce", &self.debounce)
            .field("source", &self.source)
            .field("pending_change", &self.pending_change.is_some())
            .finish()
    }
}

impl NetworkMonitor {
    /// Subscribe to the platform's signals.
    pub fn register(platform: &dyn PlatformSignals, debounce: Duration) -> Self {
        let source = if platform.supports_online_events() {
            Some(ConnectivitySource::OnlineOffline)
        } else if platform.supports_connection_change() {
            Some(ConnectivitySource::ConnectionChange)
        } else {
            None
        };

        let mut streams = SelectAll::new();
        streams.push(platform.subscribe_visibility());
        if let Some(source) = source {
            streams.push(platform.subscribe_connectivity(source));
        }
        debug!(?source, "Registered network monitor");

        Self {
            streams,
            debounce,
            pending_change: None,
            source,
        }
    }

    /// The connectivity source in use, if the platform offers one.
    #[must_use]
    pub fn source(&self) -> Option<ConnectivitySource> {
        self.source
    }

    /// Wait for the next signal to act on.
    ///
    /// Cancel safe. Pends forever once every subscription has ended.
    pub async fn next_signal(&mut self) -> PlatformSignal {
        loop {
            let listening = !self.streams.is_empty();
            let debouncing = self.pending_change.is_some();

            tokio::select! {
                signal = self.streams.next(), if listening => match signal {
                    // Changes inside an open window fold into it
                    Some(PlatformSignal::ConnectionChange) => {
                        if self.pending_change.is_none() {
                            self.pending_change = Some(Box::pin(sleep(self.debounce)));
                        }
                    }
                    Some(signal) => return signal,
                    // Every subscription ended; the guard stops further polls
                    None => {}
                },
                () = settle(&mut self.pending_change), if debouncing => {
                    self.pending_change = None;
                    return PlatformSignal::ConnectionChange;
                }
                else => std::future::pending::<()>().await,
            }
        }
    }
}

async fn settle(pending: &mut Option<Pin<Box<Sleep>>>) {
    match pending {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
