//! Terminal Observer Port (Driven Port)
//!
//! Hooks the adapter invokes at its lifecycle points. Implementations decide
//! where the signal goes (logs, metrics, nowhere).

use super::trading_terminal_port::TerminalError;
use crate::domain::account::{AccountLabel, SessionId};
use crate::domain::session::TerminalDisconnected;

/// Which trade query produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeQuery {
    /// Open trades.
    Open,
    /// Closed trade history.
    Closed,
}

impl TradeQuery {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Observer of terminal lifecycle events.
#[cfg_attr(test, mockall::automock)]
pub trait TerminalObserver: Send + Sync {
    /// A connect attempt is starting.
    fn connecting(&self, account: &AccountLabel, host: &str, port: u16);

    /// Session setup succeeded.
    fn connected(&self, account: &AccountLabel, session_id: SessionId);

    /// Session setup failed.
    fn connect_failed(&self, account: &AccountLabel, error: &TerminalError);

    /// The remote side dropped the session.
    fn disconnected(&self, event: &TerminalDisconnected);

    /// Quote retries were exhausted without data.
    fn quote_unavailable(&self, account: &AccountLabel, symbol: &str, attempts: u32);

    /// A trade query completed.
    fn trades_fetched(&self, account: &AccountLabel, query: TradeQuery, count: usize);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTerminalObserver;

impl TerminalObserver for NoOpTerminalObserver {
    fn connecting(&self, _account: &AccountLabel, _host: &str, _port: u16) {}

    fn connected(&self, _account: &AccountLabel, _session_id: SessionId) {}

    fn connect_failed(&self, _account: &AccountLabel, _error: &TerminalError) {}

    fn disconnected(&self, _event: &TerminalDisconnected) {}

    fn quote_unavailable(&self, _account: &AccountLabel, _symbol: &str, _attempts: u32) {}

    fn trades_fetched(&self, _account: &AccountLabel, _query: TradeQuery, _count: usize) {}
}
