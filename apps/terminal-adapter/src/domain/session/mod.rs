//! Session lifecycle state and the events it emits.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::{AccountLabel, SessionId};

/// Connection state of a terminal session.
///
/// `Disconnected` is both the initial state and the terminal state of each
/// session; a new `connect` re-enters the cycle with a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No live session.
    #[default]
    Disconnected,
    /// Setup is running or the remote handshake has not completed yet.
    Connecting,
    /// The remote reports the session up.
    Connected,
}

impl SessionState {
    /// Whether this is the `Connected` state.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Published once per session when the remote side drops it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalDisconnected {
    /// Account whose session dropped.
    pub account: AccountLabel,
    /// The session that dropped.
    pub session_id: SessionId,
    /// Reason reported by the remote client, unchanged.
    pub reason: String,
    /// When the adapter observed the drop.
    pub occurred_at: DateTime<Utc>,
}
