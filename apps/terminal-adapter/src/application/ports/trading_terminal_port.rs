//! Trading Terminal Port (Driver Port)
//!
//! The surface upstream trading services use to talk to one account on a
//! remote quote server.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::quote_client_port::RemoteFault;
use crate::domain::account::AccountLabel;
use crate::domain::session::{SessionState, TerminalDisconnected};
use crate::domain::trading::{Quote, TradeRecord};

/// Message carried by a `Connect` error raised from a query precheck.
pub const DISCONNECTED_MESSAGE: &str = "Disconnected";

/// Terminal error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TerminalError {
    /// Session setup failed, or a query ran while disconnected.
    #[error("{account}: {message}")]
    Connect {
        /// Account the session belongs to.
        account: AccountLabel,
        /// Diagnostic message.
        message: String,
    },

    /// The remote handshake did not complete in time.
    #[error("Could not connect to server {host}:{port} in {}s", .timeout.as_secs_f64())]
    ConnectTimeout {
        /// Server host.
        host: String,
        /// Server port.
        port: u16,
        /// How long the adapter waited.
        timeout: Duration,
    },

    /// The caller's cancellation token was honored. Not a failure.
    #[error("Operation cancelled")]
    Cancelled,

    /// A remote query failed. Passed through unchanged.
    #[error(transparent)]
    Remote(#[from] RemoteFault),

    /// The worker running a blocking remote call panicked or was aborted.
    #[error("Remote call worker failed: {0}")]
    Worker(String),
}

impl TerminalError {
    /// Build the error returned when a query finds the session down.
    #[must_use]
    pub fn disconnected(account: AccountLabel) -> Self {
        Self::Connect {
            account,
            message: DISCONNECTED_MESSAGE.to_string(),
        }
    }

    /// Whether this is a cancellation outcome rather than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this is a connect-class error (setup, precheck or timeout).
    #[must_use]
    pub const fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectTimeout { .. })
    }
}

/// Port for querying one trading account.
#[async_trait]
pub trait TradingTerminalPort: Send + Sync {
    /// Current session state.
    fn state(&self) -> SessionState;

    /// True iff a session exists and the remote reports it connected.
    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Open a session, replacing any existing one.
    fn connect(&self) -> Result<(), TerminalError>;

    /// Close the session. Idempotent.
    fn disconnect(&self);

    /// Drop the disconnect subscription while keeping the session, ahead of a
    /// caller-driven reconnect.
    fn reset_subscription(&self);

    /// All currently open trades.
    async fn get_all_trades(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<TradeRecord>, TerminalError>;

    /// Trades closed between `since` and the server's current time.
    async fn get_close_trades(
        &self,
        since: DateTime<Utc>,
        token: &CancellationToken,
    ) -> Result<Vec<TradeRecord>, TerminalError>;

    /// Quote for a symbol after bounded retries, or `None`.
    async fn get_quote(&self, symbol: &str) -> Option<Quote>;

    /// Receive disconnect events. Drop the receiver to unsubscribe.
    fn subscribe_disconnects(&self) -> broadcast::Receiver<TerminalDisconnected>;
}
