//! Terminal Adapter
//!
//! Owns at most one session to the remote quote server for one account.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ── connect() ──► Connecting ── handshake ──► Connected
//!      ▲                                                        │
//!      └──────────── disconnect() / remote drop ◄───────────────┘
//! ```
//!
//! `connect` replaces any existing session: the old one is unsubscribed and
//! closed without publishing a disconnect event. Connect, disconnect and
//! subscription reset are serialized; queries only take a snapshot of the
//! session handle.
//!
//! # Disconnect re-publication
//!
//! Each session registers one handler with the remote client. When the remote
//! signals a drop, the handler marks the session disconnected, notifies the
//! observer, broadcasts a `TerminalDisconnected` and unsubscribes itself. The
//! per-session flag makes this happen at most once per session.
//!
//! Observers run on the remote client's delivery context and must not call
//! `connect`, `disconnect` or `reset_subscription`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::mapper::RecordMapper;
use super::session::{ActiveSession, SessionFlags};
use crate::application::ports::{
    DisconnectHandler, EventDelivery, QuoteConnector, QuoteSession, RemoteDisconnect, RemoteFault,
    TerminalError, TerminalObserver, TradeQuery, TradingTerminalPort,
};
use crate::domain::account::{AccountCredentials, AccountLabel, SessionId};
use crate::domain::session::{SessionState, TerminalDisconnected};
use crate::domain::trading::{Quote, TradeRecord};
use crate::infrastructure::config::{MAX_QUOTE_ATTEMPTS, TerminalSettings};
use crate::infrastructure::observability::TracingObserver;

/// Adapter between one trading account and the remote quote server.
pub struct TerminalAdapter {
    credentials: AccountCredentials,
    label: AccountLabel,
    connector: Arc<dyn QuoteConnector>,
    observer: Arc<dyn TerminalObserver>,
    settings: TerminalSettings,
    lifecycle: Mutex<()>,
    session: RwLock<Option<ActiveSession>>,
    connecting: AtomicBool,
    events: broadcast::Sender<TerminalDisconnected>,
}

impl TerminalAdapter {
    /// Create an adapter with default settings and a tracing observer.
    ///
    /// Nothing is opened until `connect`.
    #[must_use]
    pub fn new(credentials: AccountCredentials, connector: Arc<dyn QuoteConnector>) -> Self {
        let settings = TerminalSettings::default();
        let (events, _) = broadcast::channel(settings.event_capacity);
        let label = credentials.label();

        Self {
            credentials,
            label,
            connector,
            observer: Arc::new(TracingObserver),
            settings,
            lifecycle: Mutex::new(()),
            session: RwLock::new(None),
            connecting: AtomicBool::new(false),
            events,
        }
    }

    /// Replace the observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn TerminalObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the settings.
    ///
    /// Rebuilds the disconnect channel, so call before subscribing.
    #[must_use]
    pub fn with_settings(mut self, settings: TerminalSettings) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        self.events = events;
        self.settings = settings;
        self
    }

    /// The account's loggable identity.
    #[must_use]
    pub const fn label(&self) -> &AccountLabel {
        &self.label
    }

    /// The account credentials.
    #[must_use]
    pub const fn credentials(&self) -> &AccountCredentials {
        &self.credentials
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &TerminalSettings {
        &self.settings
    }

    /// Identifier of the current session, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.read().as_ref().map(|session| session.id)
    }

    /// Whether the current session still has its disconnect handler registered.
    #[must_use]
    pub fn has_disconnect_subscription(&self) -> bool {
        self.current()
            .is_some_and(|session| session.flags.is_subscribed())
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.connecting.load(Ordering::SeqCst) {
            return SessionState::Connecting;
        }
        match self.current() {
            None => SessionState::Disconnected,
            Some(session) if session.observe_connected() => SessionState::Connected,
            Some(session)
                if session.flags.is_disconnected() || session.flags.was_established() =>
            {
                SessionState::Disconnected
            }
            Some(_) => SessionState::Connecting,
        }
    }

    /// True iff a session exists and the remote reports it connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.current()
            .is_some_and(|session| session.observe_connected())
    }

    /// Receive disconnect events. Drop the receiver to unsubscribe.
    #[must_use]
    pub fn subscribe_disconnects(&self) -> broadcast::Receiver<TerminalDisconnected> {
        self.events.subscribe()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open a new session, replacing any existing one.
    ///
    /// Initiates the remote handshake without waiting for it, configures
    /// single-threaded event delivery and subscribes to the remote disconnect
    /// signal. If any step faults, the new session is disconnected before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns `TerminalError::Connect` carrying the account label and the
    /// fault's diagnostic message.
    pub fn connect(&self) -> Result<(), TerminalError> {
        let _lifecycle = self.lifecycle.lock();
        self.connecting.store(true, Ordering::SeqCst);
        let result = self.open_session();
        self.connecting.store(false, Ordering::SeqCst);
        result
    }

    /// Connect and wait until the remote handshake completes.
    ///
    /// # Errors
    ///
    /// Returns the `connect` error, `TerminalError::Connect` if the session
    /// drops while waiting, or `TerminalError::ConnectTimeout` after
    /// `timeout`, in which case the session is closed.
    pub async fn connect_and_wait(&self, timeout: Duration) -> Result<(), TerminalError> {
        self.connect()?;

        let poll = self.settings.connect_poll_interval;
        let handshake = async {
            loop {
                match self.state() {
                    SessionState::Connected => return Ok(()),
                    SessionState::Disconnected => {
                        return Err(TerminalError::disconnected(self.label.clone()));
                    }
                    SessionState::Connecting => tokio::time::sleep(poll).await,
                }
            }
        };

        if let Ok(result) = tokio::time::timeout(timeout, handshake).await {
            return result;
        }

        self.disconnect();
        let error = TerminalError::ConnectTimeout {
            host: self.credentials.host().to_string(),
            port: self.credentials.port(),
            timeout,
        };
        self.observer.connect_failed(&self.label, &error);
        Err(error)
    }

    /// Close the session and drop its disconnect subscription.
    ///
    /// Safe to call repeatedly or without a prior `connect`.
    pub fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock();
        let session = self.session.write().take();
        if let Some(session) = session {
            session.handle.disconnect();
            session.flags.release(session.handle.as_ref());
        }
    }

    /// Drop the disconnect subscription but keep the session.
    ///
    /// Used before a caller-driven reconnect so handlers never stack up.
    pub fn reset_subscription(&self) {
        let _lifecycle = self.lifecycle.lock();
        if let Some(session) = self.current() {
            session.observe_connected();
            session.flags.release(session.handle.as_ref());
        }
    }

    fn open_session(&self) -> Result<(), TerminalError> {
        let previous = self.session.write().take();
        if let Some(previous) = previous {
            tracing::debug!(account = %self.label, session_id = %previous.id, "Replacing existing session");
            previous.close_quietly();
        }

        let creds = &self.credentials;
        self.observer
            .connecting(&self.label, creds.host(), creds.port());

        let session = ActiveSession {
            id: SessionId::generate(),
            handle: self.connector.create_session(
                creds.login(),
                creds.password(),
                creds.host(),
                creds.port(),
            ),
            flags: Arc::new(SessionFlags::default()),
        };

        if let Err(fault) = self.start_session(&session) {
            session.close_quietly();
            let error = TerminalError::Connect {
                account: self.label.clone(),
                message: fault.diagnostic_message().to_string(),
            };
            self.observer.connect_failed(&self.label, &error);
            return Err(error);
        }

        session.observe_connected();
        let session_id = session.id;
        *self.session.write() = Some(session);
        self.observer.connected(&self.label, session_id);
        Ok(())
    }

    fn start_session(&self, session: &ActiveSession) -> Result<(), RemoteFault> {
        session.handle.connect()?;
        session
            .handle
            .set_event_delivery(EventDelivery::SingleThread)?;
        let subscription = session
            .handle
            .subscribe_disconnect(self.disconnect_handler(session))?;
        session
            .flags
            .store_subscription(subscription, session.handle.as_ref());
        Ok(())
    }

    fn disconnect_handler(&self, session: &ActiveSession) -> DisconnectHandler {
        let handle = Arc::downgrade(&session.handle);
        let flags = Arc::clone(&session.flags);
        let session_id = session.id;
        let account = self.label.clone();
        let observer = Arc::clone(&self.observer);
        let events = self.events.clone();

        Arc::new(move |signal: &RemoteDisconnect| {
            if !flags.mark_disconnected() {
                return;
            }

            let event = TerminalDisconnected {
                account: account.clone(),
                session_id,
                reason: signal.reason.clone(),
                occurred_at: Utc::now(),
            };
            observer.disconnected(&event);
            // No receivers is fine.
            let _ = events.send(event);

            if let Some(handle) = handle.upgrade() {
                flags.release(handle.as_ref());
            }
        })
    }

    fn current(&self) -> Option<ActiveSession> {
        self.session.read().clone()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn live_handle(&self) -> Result<Arc<dyn QuoteSession>, TerminalError> {
        match self.current() {
            Some(session) if session.observe_connected() => Ok(session.handle),
            _ => Err(TerminalError::disconnected(self.label.clone())),
        }
    }

    /// All open trades. Blocks on the remote call.
    ///
    /// # Errors
    ///
    /// `TerminalError::Connect` with message "Disconnected" if the session is
    /// down, otherwise remote faults unchanged.
    pub fn get_all_trades(&self) -> Result<Vec<TradeRecord>, TerminalError> {
        let handle = self.live_handle()?;
        let records = fetch_open_trades(handle.as_ref())?;
        self.observer
            .trades_fetched(&self.label, TradeQuery::Open, records.len());
        Ok(records)
    }

    /// Trades closed between `since` and the server's current time. Blocks on
    /// the remote calls.
    ///
    /// # Errors
    ///
    /// Same as `get_all_trades`.
    pub fn get_close_trades(&self, since: DateTime<Utc>) -> Result<Vec<TradeRecord>, TerminalError> {
        let handle = self.live_handle()?;
        let records = fetch_closed_trades(handle.as_ref(), since)?;
        self.observer
            .trades_fetched(&self.label, TradeQuery::Closed, records.len());
        Ok(records)
    }

    /// `get_all_trades` on the blocking pool, racing `token`.
    ///
    /// An already-cancelled token returns `Cancelled` without touching the
    /// remote. Cancelling mid-call abandons the result; the remote call
    /// itself runs to completion in the background.
    ///
    /// # Errors
    ///
    /// `TerminalError::Cancelled`, or the errors of `get_all_trades`.
    pub async fn get_all_trades_async(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<TradeRecord>, TerminalError> {
        if token.is_cancelled() {
            return Err(TerminalError::Cancelled);
        }
        let handle = self.live_handle()?;
        let records = run_blocking(token, move || fetch_open_trades(handle.as_ref())).await?;
        self.observer
            .trades_fetched(&self.label, TradeQuery::Open, records.len());
        Ok(records)
    }

    /// `get_close_trades` on the blocking pool, racing `token`.
    ///
    /// # Errors
    ///
    /// `TerminalError::Cancelled`, or the errors of `get_close_trades`.
    pub async fn get_close_trades_async(
        &self,
        since: DateTime<Utc>,
        token: &CancellationToken,
    ) -> Result<Vec<TradeRecord>, TerminalError> {
        if token.is_cancelled() {
            return Err(TerminalError::Cancelled);
        }
        let handle = self.live_handle()?;
        let records =
            run_blocking(token, move || fetch_closed_trades(handle.as_ref(), since)).await?;
        self.observer
            .trades_fetched(&self.label, TradeQuery::Closed, records.len());
        Ok(records)
    }

    /// Quote for `symbol`, retried per the quote policy.
    ///
    /// Returns `None` without retrying if there is no session, and `None`
    /// after the last attempt if the server never had data. Never fails.
    pub async fn get_quote(&self, symbol: &str) -> Option<Quote> {
        let handle = self.current()?.handle;
        let policy = self.settings.quote;
        let attempts = policy.max_attempts.clamp(1, MAX_QUOTE_ATTEMPTS);

        for attempt in 1..=attempts {
            let session = Arc::clone(&handle);
            let wanted = symbol.to_string();
            let found = tokio::task::spawn_blocking(move || session.get_quote(&wanted))
                .await
                .ok()
                .flatten();

            if let Some(quote) = found {
                return Some(RecordMapper::map_quote(&quote));
            }
            if attempt < attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }

        self.observer
            .quote_unavailable(&self.label, symbol, attempts);
        None
    }
}

impl fmt::Debug for TerminalAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalAdapter")
            .field("account", &self.label)
            .field("host", &self.credentials.host())
            .field("port", &self.credentials.port())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for TerminalAdapter {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.close_quietly();
        }
    }
}

#[async_trait]
impl TradingTerminalPort for TerminalAdapter {
    fn state(&self) -> SessionState {
        Self::state(self)
    }

    fn is_connected(&self) -> bool {
        Self::is_connected(self)
    }

    fn connect(&self) -> Result<(), TerminalError> {
        Self::connect(self)
    }

    fn disconnect(&self) {
        Self::disconnect(self);
    }

    fn reset_subscription(&self) {
        Self::reset_subscription(self);
    }

    async fn get_all_trades(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<TradeRecord>, TerminalError> {
        self.get_all_trades_async(token).await
    }

    async fn get_close_trades(
        &self,
        since: DateTime<Utc>,
        token: &CancellationToken,
    ) -> Result<Vec<TradeRecord>, TerminalError> {
        self.get_close_trades_async(since, token).await
    }

    async fn get_quote(&self, symbol: &str) -> Option<Quote> {
        Self::get_quote(self, symbol).await
    }

    fn subscribe_disconnects(&self) -> broadcast::Receiver<TerminalDisconnected> {
        Self::subscribe_disconnects(self)
    }
}

// =============================================================================
// Blocking Remote Calls
// =============================================================================

fn fetch_open_trades(session: &dyn QuoteSession) -> Result<Vec<TradeRecord>, RemoteFault> {
    let orders = session.opened_orders()?;
    Ok(RecordMapper::map_many(&orders))
}

fn fetch_closed_trades(
    session: &dyn QuoteSession,
    since: DateTime<Utc>,
) -> Result<Vec<TradeRecord>, RemoteFault> {
    let until = session.server_time()?;
    let orders = session.download_order_history(since.naive_utc(), until)?;
    Ok(RecordMapper::map_many(&orders))
}

async fn run_blocking<T, F>(token: &CancellationToken, work: F) -> Result<T, TerminalError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RemoteFault> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);
    tokio::select! {
        biased;
        () = token.cancelled() => Err(TerminalError::Cancelled),
        joined = task => match joined {
            Ok(result) => result.map_err(TerminalError::from),
            Err(e) => Err(TerminalError::Worker(e.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::application::ports::{MockTerminalObserver, NoOpTerminalObserver, RemoteOrder};
    use crate::domain::account::AccountId;
    use crate::domain::trading::TradeState;
    use crate::infrastructure::config::QuoteRetrySettings;
    use crate::infrastructure::quote_client::SimulatedQuoteConnector;

    fn credentials() -> AccountCredentials {
        AccountCredentials::new(
            AccountId::new(7),
            12345,
            "hunter2",
            "demo.broker.com",
            443,
            "Demo",
        )
    }

    fn adapter(connector: &SimulatedQuoteConnector) -> TerminalAdapter {
        TerminalAdapter::new(credentials(), Arc::new(connector.clone()))
            .with_observer(Arc::new(NoOpTerminalObserver))
    }

    fn observed(connector: &SimulatedQuoteConnector, observer: MockTerminalObserver) -> TerminalAdapter {
        TerminalAdapter::new(credentials(), Arc::new(connector.clone()))
            .with_observer(Arc::new(observer))
    }

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn order(ticket: i32, close_time: NaiveDateTime) -> RemoteOrder {
        RemoteOrder {
            ticket,
            order_type: 0,
            state: Some(3),
            magic_number: 0,
            lots: Decimal::ONE,
            open_time: at(1),
            open_price: Decimal::new(108_450, 5),
            symbol: "EURUSD".to_string(),
            comment: String::new(),
            close_time,
            profit: Decimal::new(1250, 2),
            take_profit: Decimal::ZERO,
            commission: Decimal::ZERO,
            stop_loss: Decimal::ZERO,
            swap: Decimal::ZERO,
            close_price: Decimal::new(108_575, 5),
            placed_reason: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Connect
    // -------------------------------------------------------------------------

    #[test]
    fn connect_opens_single_threaded_subscribed_session() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        assert_eq!(adapter.state(), SessionState::Disconnected);

        adapter.connect().unwrap();

        assert!(adapter.is_connected());
        assert_eq!(adapter.state(), SessionState::Connected);
        assert!(adapter.has_disconnect_subscription());

        let session = connector.last_session().unwrap();
        assert_eq!(session.login(), 12345);
        assert_eq!(session.host(), "demo.broker.com");
        assert_eq!(session.port(), 443);
        assert_eq!(session.event_delivery(), EventDelivery::SingleThread);
        assert_eq!(session.handler_count(), 1);
    }

    #[test]
    fn connect_fault_prefers_connector_inner_message() {
        let connector = SimulatedQuoteConnector::new();
        connector.fail_next_connect(
            RemoteFault::connector("QuoteConnector: login failed")
                .with_inner(RemoteFault::client("invalid account")),
        );
        let adapter = adapter(&connector);

        let err = adapter.connect().unwrap_err();

        assert_eq!(err.to_string(), "[7](Demo) 12345: invalid account");
        assert!(!adapter.is_connected());
        assert_eq!(adapter.state(), SessionState::Disconnected);
        assert_eq!(connector.last_session().unwrap().disconnect_calls(), 1);
    }

    #[test]
    fn connect_fault_without_connector_origin_keeps_outer_message() {
        let connector = SimulatedQuoteConnector::new();
        connector.fail_next_connect(
            RemoteFault::client("server busy").with_inner(RemoteFault::client("ignored")),
        );
        let err = adapter(&connector).connect().unwrap_err();
        assert!(err.to_string().ends_with(": server busy"));
    }

    #[test]
    fn subscribe_fault_releases_half_open_session() {
        let connector = SimulatedQuoteConnector::new();
        connector.fail_next_subscribe(RemoteFault::client("event pump unavailable"));
        let adapter = adapter(&connector);

        let err = adapter.connect().unwrap_err();

        assert!(err.is_connect());
        assert!(adapter.session_id().is_none());
        let session = connector.last_session().unwrap();
        assert!(!session.is_connected());
        assert_eq!(session.disconnect_calls(), 1);
        assert_eq!(session.handler_count(), 0);
    }

    #[test]
    fn connect_notifies_observer_once() {
        let connector = SimulatedQuoteConnector::new();
        let mut observer = MockTerminalObserver::new();
        observer
            .expect_connecting()
            .withf(|account, host, port| {
                account.login == 12345 && host.to_string() == "demo.broker.com" && *port == 443
            })
            .times(1)
            .return_const(());
        observer.expect_connected().times(1).return_const(());

        observed(&connector, observer).connect().unwrap();
    }

    #[test]
    fn connect_failure_notifies_observer_once() {
        let connector = SimulatedQuoteConnector::new();
        connector.fail_next_connect(RemoteFault::client("bad password"));
        let mut observer = MockTerminalObserver::new();
        observer.expect_connecting().times(1).return_const(());
        observer
            .expect_connect_failed()
            .withf(|_, error| error.to_string().contains("bad password"))
            .times(1)
            .return_const(());

        assert!(observed(&connector, observer).connect().is_err());
    }

    #[test]
    fn repeated_connect_replaces_session_silently() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        let mut events = adapter.subscribe_disconnects();

        adapter.connect().unwrap();
        let first = connector.last_session().unwrap();
        let first_id = adapter.session_id().unwrap();

        adapter.connect().unwrap();

        assert_eq!(connector.session_count(), 2);
        assert_ne!(adapter.session_id().unwrap(), first_id);
        assert!(!first.is_connected());
        assert_eq!(first.handler_count(), 0);
        assert!(adapter.is_connected());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    // -------------------------------------------------------------------------
    // Disconnect
    // -------------------------------------------------------------------------

    #[test]
    fn disconnect_without_session_is_noop() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        adapter.disconnect();
        adapter.disconnect();
        assert_eq!(adapter.state(), SessionState::Disconnected);
        assert_eq!(connector.session_count(), 0);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        adapter.connect().unwrap();

        adapter.disconnect();
        adapter.disconnect();

        let session = connector.last_session().unwrap();
        assert_eq!(session.disconnect_calls(), 1);
        assert_eq!(session.handler_count(), 0);
        assert!(!adapter.is_connected());
        assert!(adapter.session_id().is_none());
    }

    #[test]
    fn remote_drop_is_republished_exactly_once() {
        let connector = SimulatedQuoteConnector::new();
        let mut observer = MockTerminalObserver::new();
        observer.expect_connecting().return_const(());
        observer.expect_connected().return_const(());
        observer
            .expect_disconnected()
            .withf(|event| event.reason == "network unreachable" && event.account.login == 12345)
            .times(1)
            .return_const(());
        let adapter = observed(&connector, observer);
        let mut events = adapter.subscribe_disconnects();

        adapter.connect().unwrap();
        let session_id = adapter.session_id().unwrap();
        let session = connector.last_session().unwrap();

        session.drop_connection("network unreachable");
        session.emit_disconnect("late duplicate");

        let event = events.try_recv().unwrap();
        assert_eq!(event.reason, "network unreachable");
        assert_eq!(event.session_id, session_id);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(session.handler_count(), 0);
        assert!(!adapter.has_disconnect_subscription());
        assert_eq!(adapter.state(), SessionState::Disconnected);
    }

    #[test]
    fn reset_subscription_keeps_session_and_silences_signal() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        let mut events = adapter.subscribe_disconnects();
        adapter.connect().unwrap();

        adapter.reset_subscription();
        adapter.reset_subscription();

        let session = connector.last_session().unwrap();
        assert_eq!(session.handler_count(), 0);
        assert!(adapter.is_connected());

        session.emit_disconnect("after reset");
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn drop_after_subscription_reset_reads_disconnected() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        adapter.connect().unwrap();

        adapter.reset_subscription();
        connector.last_session().unwrap().drop_connection("network");

        assert!(!adapter.is_connected());
        assert_eq!(adapter.state(), SessionState::Disconnected);
    }

    #[test]
    fn concurrent_connect_and_disconnect_keep_one_subscription() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = Arc::new(adapter(&connector));

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let adapter = Arc::clone(&adapter);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        if worker % 2 == 0 {
                            adapter.connect().unwrap();
                        } else {
                            adapter.disconnect();
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let sessions = connector.sessions();
        let subscribed = sessions.iter().filter(|s| s.handler_count() > 0).count();
        let live = sessions.iter().filter(|s| s.is_connected()).count();
        assert_eq!(sessions.len(), 100);
        assert!(subscribed <= 1);
        assert_eq!(live, usize::from(adapter.is_connected()));
        assert_eq!(subscribed, usize::from(adapter.has_disconnect_subscription()));
    }

    #[test]
    fn voluntary_disconnect_is_published() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        let mut events = adapter.subscribe_disconnects();
        adapter.connect().unwrap();

        adapter.disconnect();

        let event = events.try_recv().unwrap();
        assert_eq!(event.account, adapter.label().clone());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn dropping_adapter_closes_session() {
        let connector = SimulatedQuoteConnector::new();
        {
            let adapter = adapter(&connector);
            adapter.connect().unwrap();
        }
        let session = connector.last_session().unwrap();
        assert!(!session.is_connected());
        assert_eq!(session.handler_count(), 0);
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    #[test]
    fn get_all_trades_requires_connection() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);

        let err = adapter.get_all_trades().unwrap_err();

        assert_eq!(err.to_string(), "[7](Demo) 12345: Disconnected");
        assert_eq!(connector.open_order_requests(), 0);
    }

    #[test]
    fn get_all_trades_fails_after_remote_drop() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        adapter.connect().unwrap();
        connector.last_session().unwrap().drop_connection("gone");

        assert!(adapter.get_all_trades().unwrap_err().is_connect());
    }

    #[test]
    fn get_all_trades_maps_orders_in_order() {
        let connector = SimulatedQuoteConnector::new();
        connector.set_open_orders(vec![order(3, at(1)), order(1, at(1)), order(2, at(1))]);
        let adapter = adapter(&connector);
        adapter.connect().unwrap();

        let tickets: Vec<i32> = adapter
            .get_all_trades()
            .unwrap()
            .iter()
            .map(|r| r.ticket)
            .collect();
        assert_eq!(tickets, vec![3, 1, 2]);
    }

    #[test]
    fn get_close_trades_reads_until_server_time() {
        let connector = SimulatedQuoteConnector::new();
        connector.set_server_time(at(20));
        connector.set_history(vec![order(1, at(2)), order(2, at(10)), order(3, at(25))]);
        let adapter = adapter(&connector);
        adapter.connect().unwrap();

        let records = adapter.get_close_trades(at(5).and_utc()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ticket, 2);
        assert_eq!(records[0].state, Some(TradeState::ClosedNormal));
    }

    #[test]
    fn get_close_trades_requires_connection() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        assert!(adapter.get_close_trades(Utc::now()).unwrap_err().is_connect());
        assert_eq!(connector.history_requests(), 0);
    }

    #[test]
    fn history_fault_passes_through() {
        let connector = SimulatedQuoteConnector::new();
        connector.fail_next_history(RemoteFault::client("history server timeout"));
        let adapter = adapter(&connector);
        adapter.connect().unwrap();

        let err = adapter.get_close_trades(at(1).and_utc()).unwrap_err();
        assert!(matches!(err, TerminalError::Remote(ref f) if f.message == "history server timeout"));
    }

    #[test]
    fn trades_fetched_reports_query_and_count() {
        let connector = SimulatedQuoteConnector::new();
        connector.set_open_orders(vec![order(1, at(1)), order(2, at(1))]);
        let mut observer = MockTerminalObserver::new();
        observer.expect_connecting().return_const(());
        observer.expect_connected().return_const(());
        observer
            .expect_trades_fetched()
            .withf(|_, query, count| *query == TradeQuery::Open && *count == 2)
            .times(1)
            .return_const(());
        let adapter = observed(&connector, observer);
        adapter.connect().unwrap();

        adapter.get_all_trades().unwrap();
    }

    #[tokio::test]
    async fn cancelled_token_skips_remote_call() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        adapter.connect().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let open = adapter.get_all_trades_async(&token).await.unwrap_err();
        let closed = adapter
            .get_close_trades_async(Utc::now(), &token)
            .await
            .unwrap_err();

        assert!(open.is_cancelled());
        assert!(closed.is_cancelled());
        assert_eq!(connector.open_order_requests(), 0);
        assert_eq!(connector.history_requests(), 0);
    }

    #[tokio::test]
    async fn cancelling_during_remote_call_abandons_result() {
        let connector = SimulatedQuoteConnector::new();
        connector.set_open_orders(vec![order(1, at(1))]);
        let gate = connector.hold_open_orders();
        let mut observer = MockTerminalObserver::new();
        observer.expect_connecting().return_const(());
        observer.expect_connected().return_const(());
        observer.expect_trades_fetched().never();
        let adapter = observed(&connector, observer);
        adapter.connect().unwrap();
        let token = CancellationToken::new();

        let (result, ()) = tokio::join!(adapter.get_all_trades_async(&token), async {
            while gate.waiting() == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            token.cancel();
        });
        gate.open();

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(connector.open_order_requests(), 1);
    }

    #[tokio::test]
    async fn async_queries_return_mapped_records() {
        let connector = SimulatedQuoteConnector::new();
        connector.set_server_time(at(20));
        connector.set_open_orders(vec![order(10, at(1))]);
        connector.set_history(vec![order(11, at(15))]);
        let adapter = adapter(&connector);
        adapter.connect().unwrap();
        let token = CancellationToken::new();

        let open = adapter.get_all_trades_async(&token).await.unwrap();
        let closed = adapter
            .get_close_trades_async(at(14).and_utc(), &token)
            .await
            .unwrap();

        assert_eq!(open[0].ticket, 10);
        assert_eq!(closed[0].ticket, 11);
    }

    #[tokio::test]
    async fn async_query_checks_connection() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        let err = adapter
            .get_all_trades_async(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_connect());
    }

    // -------------------------------------------------------------------------
    // Quotes
    // -------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn get_quote_retries_until_data_arrives() {
        let connector = SimulatedQuoteConnector::new();
        connector.set_quote_after("EURUSD", Decimal::new(108_450, 5), Decimal::new(108_470, 5), 3);
        let adapter = adapter(&connector);
        adapter.connect().unwrap();

        let started = tokio::time::Instant::now();
        let quote = adapter.get_quote("EURUSD").await.unwrap();

        assert_eq!(quote.symbol, "EURUSD");
        assert_eq!(quote.bid, Decimal::new(108_450, 5));
        assert_eq!(connector.quote_requests(), 4);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn get_quote_gives_up_after_ten_attempts() {
        let connector = SimulatedQuoteConnector::new();
        let mut observer = MockTerminalObserver::new();
        observer.expect_connecting().return_const(());
        observer.expect_connected().return_const(());
        observer
            .expect_quote_unavailable()
            .withf(|_, symbol, attempts| symbol.to_string() == "GBPJPY" && *attempts == 10)
            .times(1)
            .return_const(());
        let adapter = observed(&connector, observer);
        adapter.connect().unwrap();

        let started = tokio::time::Instant::now();
        assert!(adapter.get_quote("GBPJPY").await.is_none());

        assert_eq!(connector.quote_requests(), 10);
        assert!(started.elapsed() >= Duration::from_millis(900));
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn get_quote_honors_configured_attempts() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector).with_settings(TerminalSettings {
            quote: QuoteRetrySettings {
                max_attempts: 2,
                interval: Duration::from_millis(1),
            },
            ..TerminalSettings::default()
        });
        adapter.connect().unwrap();

        assert!(adapter.get_quote("EURUSD").await.is_none());
        assert_eq!(connector.quote_requests(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn get_quote_never_exceeds_attempt_cap() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector).with_settings(TerminalSettings {
            quote: QuoteRetrySettings {
                max_attempts: 25,
                interval: Duration::from_millis(100),
            },
            ..TerminalSettings::default()
        });
        adapter.connect().unwrap();

        assert!(adapter.get_quote("EURUSD").await.is_none());
        assert_eq!(connector.quote_requests(), MAX_QUOTE_ATTEMPTS);
    }

    #[tokio::test]
    async fn get_quote_without_session_is_absent() {
        let connector = SimulatedQuoteConnector::new();
        let adapter = adapter(&connector);
        assert!(adapter.get_quote("EURUSD").await.is_none());
        assert_eq!(connector.quote_requests(), 0);
    }

    // -------------------------------------------------------------------------
    // Handshake
    // -------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn connect_and_wait_returns_once_handshake_completes() {
        let connector = SimulatedQuoteConnector::new();
        connector.set_handshake_completes(false);
        let adapter = Arc::new(adapter(&connector));

        let waiter = {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move { adapter.connect_and_wait(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(adapter.state(), SessionState::Connecting);
        connector.last_session().unwrap().complete_handshake();

        waiter.await.unwrap().unwrap();
        assert_eq!(adapter.state(), SessionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_and_wait_times_out_and_closes_session() {
        let connector = SimulatedQuoteConnector::new();
        connector.set_handshake_completes(false);
        let adapter = adapter(&connector);

        let err = adapter
            .connect_and_wait(Duration::from_secs(2))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Could not connect to server demo.broker.com:443 in 2s"
        );
        assert_eq!(adapter.state(), SessionState::Disconnected);
        assert_eq!(connector.last_session().unwrap().disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn port_surface_delegates_to_adapter() {
        let connector = SimulatedQuoteConnector::new();
        connector.set_open_orders(vec![order(1, at(1))]);
        let port: Arc<dyn TradingTerminalPort> = Arc::new(adapter(&connector));

        port.connect().unwrap();
        assert!(port.is_connected());
        assert_eq!(port.state(), SessionState::Connected);

        let trades = port.get_all_trades(&CancellationToken::new()).await.unwrap();
        assert_eq!(trades.len(), 1);

        port.disconnect();
        assert!(!port.is_connected());
    }
}
