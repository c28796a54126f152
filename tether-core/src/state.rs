//! Connection ready states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of an event source session.
///
/// `Closed` and `Waiting` are both "not connected". They are kept apart so that a
/// pending reconnection can be hastened when the network comes back, while a
/// closed session stays closed until reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    /// Not connected and not trying to connect.
    #[default]
    Closed,
    /// Not connected; a reconnection is scheduled.
    Waiting,
    /// Establishing a connection to the server.
    Connecting,
    /// Connected and receiving events.
    Open,
}

impl ReadyState {
    /// Numeric code of the state: CLOSED=0, WAITING=1, CONNECTING=2, OPEN=3.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Waiting => 1,
            Self::Connecting => 2,
            Self::Open => 3,
        }
    }

    /// Look up a state by its numeric code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Closed),
            1 => Some(Self::Waiting),
            2 => Some(Self::Connecting),
            3 => Some(Self::Open),
            _ => None,
        }
    }

    /// Whether a connection attempt is in flight or streaming.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "CLOSED",
            Self::Waiting => "WAITING",
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
        };
        f.write_str(name)
    }
}
