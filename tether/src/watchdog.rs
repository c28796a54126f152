//! Inactivity watchdog.

use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Instant, Sleep};

/// A re-armable inactivity timer for the current attempt.
///
/// The timer is armed when an attempt starts and again for every chunk that
/// arrives. [`expired`](Self::expired) resolves once the deadline passes with
/// no re-arm in between.
#[derive(Debug)]
pub struct Watchdog {
    timeout: Duration,
    sleep: Pin<Box<Sleep>>,
    armed: bool,
    deadline: Option<Instant>,
}

impl Watchdog {
    /// Create a disarmed watchdog.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sleep: Box::pin(sleep(timeout)),
            armed: false,
            deadline: None,
        }
    }

    /// The inactivity timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start or restart the timer from now.
    pub fn arm(&mut self) {
        let deadline = Instant::now() + self.timeout;
        self.sleep.as_mut().reset(deadline);
        self.deadline = Some(deadline);
        self.armed = true;
    }

    /// Stop the timer. The last deadline is remembered.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Whether the timer is running.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// The most recent deadline, if the watchdog was ever armed.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the most recent deadline is at or before `now`.
    ///
    /// A watchdog that was never armed has no deadline to wait for.
    #[must_use]
    pub fn deadline_passed(&self, now: Instant) -> bool {
        self.deadline.map_or(true, |deadline| deadline <= now)
    }

    /// Resolve when the armed timer fires, disarming it.
    ///
    /// Pends forever while disarmed. Cancel safe.
    pub async fn expired(&mut self) {
        if !self.armed {
            std::future::pending::<()>().await;
        }
        self.sleep.as_mut().await;
        self.armed = false;
    }
}
