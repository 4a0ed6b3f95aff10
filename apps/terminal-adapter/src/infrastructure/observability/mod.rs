//! Tracing Observer
//!
//! Default `TerminalObserver`: structured `tracing` events plus Prometheus
//! counters. Every event carries the account's id, display name and login.

use crate::application::ports::{TerminalError, TerminalObserver, TradeQuery};
use crate::domain::account::{AccountLabel, SessionId};
use crate::domain::session::TerminalDisconnected;
use crate::infrastructure::metrics::{self, ConnectResult};

/// Observer that logs through `tracing` and records metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TerminalObserver for TracingObserver {
    fn connecting(&self, account: &AccountLabel, host: &str, port: u16) {
        tracing::info!(
            account_id = %account.account_id,
            display_name = %account.display_name,
            login = account.login,
            host,
            port,
            "Connecting to quote server"
        );
    }

    fn connected(&self, account: &AccountLabel, session_id: SessionId) {
        metrics::record_connect_attempt(ConnectResult::Success);
        tracing::info!(
            account_id = %account.account_id,
            display_name = %account.display_name,
            login = account.login,
            %session_id,
            "Quote server session opened"
        );
    }

    fn connect_failed(&self, account: &AccountLabel, error: &TerminalError) {
        metrics::record_connect_attempt(ConnectResult::Failure);
        tracing::error!(
            account_id = %account.account_id,
            display_name = %account.display_name,
            login = account.login,
            error = %error,
            "Quote server connect failed"
        );
    }

    fn disconnected(&self, event: &TerminalDisconnected) {
        metrics::record_disconnect();
        tracing::warn!(
            account_id = %event.account.account_id,
            display_name = %event.account.display_name,
            login = event.account.login,
            session_id = %event.session_id,
            reason = %event.reason,
            "Disconnected from quote server"
        );
    }

    fn quote_unavailable(&self, account: &AccountLabel, symbol: &str, attempts: u32) {
        metrics::record_quote_miss();
        tracing::debug!(
            account_id = %account.account_id,
            login = account.login,
            symbol,
            attempts,
            "No quote after retries"
        );
    }

    fn trades_fetched(&self, account: &AccountLabel, query: TradeQuery, count: usize) {
        metrics::record_trades_fetched(query, count);
        tracing::debug!(
            account_id = %account.account_id,
            login = account.login,
            query = query.as_str(),
            count,
            "Trades fetched"
        );
    }
}
