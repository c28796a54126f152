//! Connection state machine.
//!
//! The driver task is the only writer of session state. It reacts, one at a
//! time, to consumer commands, messages from the current attempt, watchdog
//! expiry, the reconnect timer and monitor signals.

use crate::attempt::{build_request, run_attempt, AttemptId, AttemptMessage};
use crate::config::EventSourceConfig;
use crate::monitor::{decide, MonitorAction, NetworkMonitor};
use crate::observer::{EventSourceObserver, PermanentFailure};
use crate::signals::{PlatformSignal, PlatformSignals};
use crate::transport::{ResponseHead, Transport};
use crate::watchdog::Watchdog;
use std::pin::Pin;
use std::sync::Arc;
use tether_core::{EventSourceId, ReadyState, ServerSentEvent};
use tether_retries::{AttemptFailure, FailureKind, ReconnectBackoff};
use tether_streaming::SseFrame;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Requests from the consumer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Open,
    Close,
}

struct CurrentAttempt {
    id: AttemptId,
    cancel: CancellationToken,
}

pub(crate) struct Driver {
    source: EventSourceId,
    config: Arc<EventSourceConfig>,
    transport: Arc<dyn Transport>,
    platform: Arc<dyn PlatformSignals>,
    observer: Box<dyn EventSourceObserver>,

    ready_state: ReadyState,
    state_tx: watch::Sender<ReadyState>,
    last_event_id: String,
    origin: String,
    backoff: ReconnectBackoff,

    current: Option<CurrentAttempt>,
    next_attempt: u64,
    watchdog: Watchdog,
    reconnect: Option<Pin<Box<Sleep>>>,
    monitor: Option<NetworkMonitor>,

    commands: mpsc::UnboundedReceiver<Command>,
    attempt_tx: mpsc::UnboundedSender<AttemptMessage>,
    attempt_rx: mpsc::UnboundedReceiver<AttemptMessage>,
}

impl Driver {
    pub(crate) fn new(
        source: EventSourceId,
        config: EventSourceConfig,
        transport: Arc<dyn Transport>,
        platform: Arc<dyn PlatformSignals>,
        observer: Box<dyn EventSourceObserver>,
        commands: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<ReadyState>,
    ) -> Self {
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
        Self {
            source,
            transport,
            platform,
            observer,
            ready_state: ReadyState::Closed,
            state_tx,
            last_event_id: config.last_event_id().to_string(),
            origin: String::new(),
            backoff: ReconnectBackoff::new(config.backoff().clone()),
            current: None,
            next_attempt: 0,
            watchdog: Watchdog::new(config.inactivity_timeout()),
            reconnect: None,
            monitor: None,
            commands,
            attempt_tx,
            attempt_rx,
            config: Arc::new(config),
        }
    }

    /// Run until the consumer handle is dropped.
    pub(crate) async fn run(mut self) {
        debug!(source = %self.source, url = %self.config.url(), "Event source driver started");

        loop {
            let reconnecting = self.reconnect.is_some();
            let monitoring = self.monitor.is_some();

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Open) => self.open(),
                    Some(Command::Close) => self.close(),
                    None => {
                        self.close();
                        break;
                    }
                },

                Some(message) = self.attempt_rx.recv() => self.handle_attempt_message(message),

                () = self.watchdog.expired() => self.on_inactivity(),

                () = wait_reconnect(&mut self.reconnect), if reconnecting => {
                    self.reconnect = None;
                    self.fetch_stream();
                }

                signal = next_signal(&mut self.monitor), if monitoring => self.handle_signal(signal),
            }
        }

        debug!(source = %self.source, "Event source driver stopped");
    }

    fn open(&mut self) {
        if self.ready_state != ReadyState::Closed {
            trace!(source = %self.source, state = %self.ready_state, "Already open");
            return;
        }
        info!(source = %self.source, url = %self.config.url(), "Opening event source");

        self.monitor = Some(NetworkMonitor::register(
            self.platform.as_ref(),
            self.config.connectivity_debounce(),
        ));
        self.fetch_stream();
    }

    fn close(&mut self) {
        if self.ready_state == ReadyState::Closed {
            return;
        }
        info!(source = %self.source, "Closing event source");

        // Closed must be visible before the attempt is aborted
        self.set_ready_state(ReadyState::Closed);
        if let Some(attempt) = self.current.take() {
            attempt.cancel.cancel();
        }
        self.watchdog.disarm();
        self.reconnect = None;
        self.backoff.reset();
        self.monitor = None;
    }

    fn fetch_stream(&mut self) {
        self.reconnect = None;
        if let Some(previous) = self.current.take() {
            debug!(attempt = %previous.id, "Superseding attempt");
            previous.cancel.cancel();
        }

        let id = AttemptId(self.next_attempt);
        self.next_attempt += 1;
        let cancel = CancellationToken::new();
        let request = build_request(&self.config, &self.last_event_id, cancel.clone());
        self.current = Some(CurrentAttempt { id, cancel });

        debug!(
            source = %self.source,
            attempt = %id,
            last_event_id = %self.last_event_id,
            "Starting attempt"
        );
        self.set_ready_state(ReadyState::Connecting);
        self.watchdog.arm();

        tokio::spawn(run_attempt(
            Arc::clone(&self.transport),
            request,
            id,
            self.attempt_tx.clone(),
        ));
    }

    fn is_current(&self, id: AttemptId) -> bool {
        self.current.as_ref().is_some_and(|a| a.id == id)
    }

    fn handle_attempt_message(&mut self, message: AttemptMessage) {
        let id = message.id();
        if !self.is_current(id) {
            trace!(attempt = %id, "Ignoring message from superseded attempt");
            return;
        }

        match message {
            AttemptMessage::Opened { origin, .. } => {
                info!(source = %self.source, attempt = %id, %origin, "Event stream open");
                self.backoff.reset();
                self.origin = origin;
                self.set_ready_state(ReadyState::Open);
            }
            AttemptMessage::Activity { .. } => self.watchdog.arm(),
            AttemptMessage::Retry { delay, .. } => {
                debug!(delay_ms = delay.as_millis() as u64, "Server set minimum reconnect delay");
                self.backoff.set_min_reconnect_delay(delay);
            }
            AttemptMessage::Frame { frame, .. } => self.dispatch(frame),
            AttemptMessage::Finished {
                network_error,
                status,
                response,
                ..
            } => self.did_finish_fetch(network_error, status, response),
        }
    }

    fn dispatch(&mut self, frame: SseFrame) {
        self.last_event_id.clone_from(&frame.last_event_id);
        let event = ServerSentEvent::new(
            self.source.clone(),
            frame.event_type,
            frame.data,
            self.origin.clone(),
            frame.last_event_id,
        );
        self.observer.on_event(event);
    }

    fn did_finish_fetch(
        &mut self,
        network_error: bool,
        status: u16,
        response: Option<ResponseHead>,
    ) {
        self.current = None;
        self.watchdog.disarm();
        if self.ready_state == ReadyState::Closed {
            return;
        }

        let retry_after = response.as_ref().and_then(ResponseHead::retry_after);
        let failure = if network_error {
            AttemptFailure::Network { retry_after }
        } else {
            AttemptFailure::status(status, retry_after)
        };

        match failure.kind() {
            FailureKind::Transient => {
                let delay = self.backoff.next_delay(failure.retry_after());
                info!(
                    source = %self.source,
                    status,
                    %failure,
                    delay_ms = delay.as_millis() as u64,
                    "Connection lost, reconnecting"
                );
                self.reconnect = Some(Box::pin(sleep(delay)));
                self.set_ready_state(ReadyState::Waiting);
            }
            FailureKind::Permanent => {
                warn!(source = %self.source, status, "Permanent failure, closing event source");
                self.close();
                self.observer.on_error(PermanentFailure { status, response });
            }
        }
    }

    fn on_inactivity(&mut self) {
        if let Some(attempt) = &self.current {
            warn!(
                source = %self.source,
                attempt = %attempt.id,
                timeout_ms = self.watchdog.timeout().as_millis() as u64,
                "No data received, aborting attempt"
            );
            attempt.cancel.cancel();
        }
    }

    fn handle_signal(&mut self, signal: PlatformSignal) {
        let action = decide(
            signal,
            self.ready_state,
            self.platform.is_online(),
            self.watchdog.deadline_passed(Instant::now()),
        );

        match action {
            MonitorAction::Ignore => trace!(?signal, state = %self.ready_state, "Ignoring signal"),
            MonitorAction::AbortAttempt => {
                if let Some(attempt) = &self.current {
                    info!(?signal, attempt = %attempt.id, "Connection may be dead, aborting attempt");
                    attempt.cancel.cancel();
                }
            }
            MonitorAction::RetryNow => {
                info!(?signal, "Network may be back, reconnecting now");
                self.fetch_stream();
            }
        }
    }

    fn set_ready_state(&mut self, new: ReadyState) {
        let old = self.ready_state;
        if old == new {
            return;
        }
        self.ready_state = new;
        self.state_tx.send_replace(new);
        debug!(source = %self.source, %old, %new, "Ready state changed");
        self.observer.on_ready_state_change(old, new);
    }
}

async fn wait_reconnect(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn next_signal(monitor: &mut Option<NetworkMonitor>) -> PlatformSignal {
    match monitor {
        Some(monitor) => monitor.next_signal().await,
        None => std::future::pending().await,
    }
}
