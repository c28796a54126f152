//! The consumer-facing event source handle.

use crate::config::EventSourceConfig;
use crate::driver::{Command, Driver};
use crate::observer::{ChannelObserver, EventSourceObserver, NoopObserver, Notification};
use crate::signals::{NoSignals, PlatformSignals};
use crate::transport::{ReqwestTransport, Transport};
use std::sync::Arc;
use tether_core::{EventSourceId, ReadyState, Result, TetherError};
use tokio::sync::{mpsc, watch};

/// A resilient server-sent events session.
///
/// The session is driven by a background task. [`open`](Self::open) and
/// [`close`](Self::close) only enqueue a request for that task, so the ready
/// state changes shortly after they return; observers see every transition in
/// order. Dropping the handle closes the session and stops the task.
#[derive(Debug)]
pub struct EventSource {
    id: EventSourceId,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ReadyState>,
}

impl EventSource {
    /// Spawn a session with the default transport and no platform signals.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new<O: EventSourceObserver>(config: EventSourceConfig, observer: O) -> Self {
        Self::builder(config).observer(observer).spawn()
    }

    /// Spawn a session that reports through a channel.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_channel(
        config: EventSourceConfig,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (observer, rx) = ChannelObserver::new();
        (Self::new(config, observer), rx)
    }

    /// Create a builder.
    #[must_use]
    pub fn builder(config: EventSourceConfig) -> EventSourceBuilder {
        EventSourceBuilder::new(config)
    }

    /// The session's identifier, also the `source` of its events.
    #[must_use]
    pub fn id(&self) -> &EventSourceId {
        &self.id
    }

    /// Start connecting. Does nothing unless the session is closed.
    ///
    /// # Errors
    ///
    /// Returns [`TetherError::DriverShutdown`] if the driver task has stopped.
    pub fn open(&self) -> Result<()> {
        self.send(Command::Open)
    }

    /// Close the session. Does nothing if it is already closed.
    ///
    /// # Errors
    ///
    /// Returns [`TetherError::DriverShutdown`] if the driver task has stopped.
    pub fn close(&self) -> Result<()> {
        self.send(Command::Close)
    }

    /// The most recent ready state.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target`.
    ///
    /// Returns immediately if it is already there. Short-lived states can be
    /// missed; use an observer to see every transition.
    ///
    /// # Errors
    ///
    /// Returns [`TetherError::DriverShutdown`] if the driver stops first.
    pub async fn wait_for_state(&self, target: ReadyState) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| TetherError::DriverShutdown)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| TetherError::DriverShutdown)
    }
}

/// Builder for [`EventSource`].
pub struct EventSourceBuilder {
    config: EventSourceConfig,
    id: Option<EventSourceId>,
    transport: Option<Arc<dyn Transport>>,
    platform: Option<Arc<dyn PlatformSignals>>,
    observer: Option<Box<dyn EventSourceObserver>>,
}

impl std::fmt::Debug for EventSourceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSourceBuilder")
            .field("config", &self.config)
            .field("id", &self.id)
            .field("transport", &self.transport.is_some())
            .field("platform", &self.platform.is_some())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl EventSourceBuilder {
    /// Create a builder for the given config.
    #[must_use]
    pub fn new(config: EventSourceConfig) -> Self {
        Self {
            config,
            id: None,
            transport: None,
            platform: None,
            observer: None,
        }
    }

    /// Use a fixed session identifier instead of a random one.
    #[must_use]
    pub fn id(mut self, id: EventSourceId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the transport. Defaults to [`ReqwestTransport`].
    #[must_use]
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Set a shared transport.
    #[must_use]
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the platform signal source. Defaults to [`NoSignals`].
    #[must_use]
    pub fn platform<P: PlatformSignals + 'static>(mut self, platform: P) -> Self {
        self.platform = Some(Arc::new(platform));
        self
    }

    /// Set the observer. Defaults to one that ignores everything.
    #[must_use]
    pub fn observer<O: EventSourceObserver>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Spawn the driver task and return the handle. The session starts closed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(self) -> EventSource {
        let id = self.id.unwrap_or_default();
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let platform = self.platform.unwrap_or_else(|| Arc::new(NoSignals));
        let observer = self
            .observer
            .unwrap_or_else(|| Box::new(NoopObserver));

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ReadyState::Closed);

        let driver = Driver::new(
            id.clone(),
            self.config,
            transport,
            platform,
            observer,
            commands_rx,
            state_tx,
        );
        tokio::spawn(driver.run());

        EventSource {
            id,
            commands: commands_tx,
            state: state_rx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{SseRequest, TransportError, TransportResponse};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn fetch(&self, _request: SseRequest) -> std::result::Result<TransportResponse, TransportError> {
            std::future::pending().await
        }
    }

    fn config() -> EventSourceConfig {
        EventSourceConfig::new("https://events.test/").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_closed_and_opens() {
        let source = EventSource::builder(config())
            .transport(Unreachable)
            .id(EventSourceId::from_string("es_fixed"))
            .spawn();

        assert_eq!(source.id().as_str(), "es_fixed");
        assert_eq!(source.ready_state(), ReadyState::Closed);

        source.open().unwrap();
        source.wait_for_state(ReadyState::Connecting).await.unwrap();
        source.close().unwrap();
        source.wait_for_state(ReadyState::Closed).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_current_state_returns_immediately() {
        let source = EventSource::builder(config()).transport(Unreachable).spawn();
        source.wait_for_state(ReadyState::Closed).await.unwrap();
    }
}
