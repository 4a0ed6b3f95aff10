//! In-process quote server.
//!
//! Implements the quote client capability against in-memory state so the
//! adapter can run without a broker. The connector holds the "server" side
//! (orders, history, quotes, injected faults); each session it creates shares
//! that state and tracks its own connection flag and disconnect callbacks.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use chrono::{NaiveDateTime, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use rust_decimal::Decimal;

use crate::application::ports::{
    DisconnectHandler, EventDelivery, QuoteConnector, QuoteSession, RemoteDisconnect, RemoteFault,
    RemoteOrder, RemoteQuote, SubscriptionId,
};

/// Reason reported when a session is closed by its owner.
pub const CLIENT_DISCONNECT_REASON: &str = "Connection closed by client";

const NOT_CONNECTED: &str = "Not connected";

/// Holds remote calls until opened.
///
/// Calls passing a closed gate park their worker thread; `open` releases all
/// of them and every later call.
#[derive(Debug, Default)]
pub struct CallGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    waiting: u32,
    open: bool,
}

impl CallGate {
    /// Calls currently parked at the gate.
    #[must_use]
    pub fn waiting(&self) -> u32 {
        self.state.lock().waiting
    }

    /// Release parked calls and let later ones through.
    pub fn open(&self) {
        self.state.lock().open = true;
        self.changed.notify_all();
    }

    fn pass(&self) {
        let mut state = self.state.lock();
        state.waiting += 1;
        while !state.open {
            self.changed.wait(&mut state);
        }
        state.waiting -= 1;
    }
}

#[derive(Debug, Clone)]
struct StagedQuote {
    quote: RemoteQuote,
    misses_remaining: u32,
}

#[derive(Default)]
struct ServerState {
    open_orders: RwLock<Vec<RemoteOrder>>,
    history: RwLock<Vec<RemoteOrder>>,
    quotes: Mutex<HashMap<String, StagedQuote>>,
    server_time: RwLock<Option<NaiveDateTime>>,
    connect_faults: Mutex<VecDeque<RemoteFault>>,
    subscribe_faults: Mutex<VecDeque<RemoteFault>>,
    history_faults: Mutex<VecDeque<RemoteFault>>,
    open_orders_gate: Mutex<Option<Arc<CallGate>>>,
    manual_handshake: AtomicBool,
    quote_requests: AtomicU32,
    open_order_requests: AtomicU32,
    history_requests: AtomicU32,
    sessions: Mutex<Vec<Arc<SimulatedSession>>>,
}

impl ServerState {
    fn now(&self) -> NaiveDateTime {
        (*self.server_time.read()).unwrap_or_else(|| Utc::now().naive_utc())
    }
}

/// Connector for the in-process quote server.
///
/// Clones share the same server state.
#[derive(Clone, Default)]
pub struct SimulatedQuoteConnector {
    state: Arc<ServerState>,
}

impl SimulatedQuoteConnector {
    /// Create an empty server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the open order book.
    pub fn set_open_orders(&self, orders: Vec<RemoteOrder>) {
        *self.state.open_orders.write() = orders;
    }

    /// Replace the closed order history.
    pub fn set_history(&self, orders: Vec<RemoteOrder>) {
        *self.state.history.write() = orders;
    }

    /// Publish a quote, available immediately.
    pub fn set_quote(&self, symbol: &str, bid: Decimal, ask: Decimal) {
        self.set_quote_after(symbol, bid, ask, 0);
    }

    /// Publish a quote that only becomes visible after `misses` empty lookups.
    pub fn set_quote_after(&self, symbol: &str, bid: Decimal, ask: Decimal, misses: u32) {
        let quote = RemoteQuote {
            symbol: symbol.to_string(),
            bid,
            ask,
            time: self.state.now(),
        };
        self.state.quotes.lock().insert(
            symbol.to_string(),
            StagedQuote {
                quote,
                misses_remaining: misses,
            },
        );
    }

    /// Pin the server clock. Unpinned, it follows the wall clock.
    pub fn set_server_time(&self, time: NaiveDateTime) {
        *self.state.server_time.write() = Some(time);
    }

    /// Make the next `connect` fail with `fault`.
    pub fn fail_next_connect(&self, fault: RemoteFault) {
        self.state.connect_faults.lock().push_back(fault);
    }

    /// Make the next disconnect subscription fail with `fault`.
    pub fn fail_next_subscribe(&self, fault: RemoteFault) {
        self.state.subscribe_faults.lock().push_back(fault);
    }

    /// Make the next history download fail with `fault`.
    pub fn fail_next_history(&self, fault: RemoteFault) {
        self.state.history_faults.lock().push_back(fault);
    }

    /// Park every open order request at a closed gate until it is opened.
    pub fn hold_open_orders(&self) -> Arc<CallGate> {
        let gate = Arc::new(CallGate::default());
        *self.state.open_orders_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// When `false`, sessions stay in handshake after `connect` until
    /// `SimulatedSession::complete_handshake` is called.
    pub fn set_handshake_completes(&self, completes: bool) {
        self.state
            .manual_handshake
            .store(!completes, Ordering::SeqCst);
    }

    /// The most recently created session.
    #[must_use]
    pub fn last_session(&self) -> Option<Arc<SimulatedSession>> {
        self.state.sessions.lock().last().cloned()
    }

    /// Every session created so far, oldest first.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<SimulatedSession>> {
        self.state.sessions.lock().clone()
    }

    /// Number of sessions created so far.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.state.sessions.lock().len()
    }

    /// Number of quote lookups served.
    #[must_use]
    pub fn quote_requests(&self) -> u32 {
        self.state.quote_requests.load(Ordering::SeqCst)
    }

    /// Number of open order requests served.
    #[must_use]
    pub fn open_order_requests(&self) -> u32 {
        self.state.open_order_requests.load(Ordering::SeqCst)
    }

    /// Number of history downloads served.
    #[must_use]
    pub fn history_requests(&self) -> u32 {
        self.state.history_requests.load(Ordering::SeqCst)
    }
}

impl QuoteConnector for SimulatedQuoteConnector {
    fn create_session(
        &self,
        login: i32,
        _password: &str,
        host: &str,
        port: u16,
    ) -> Arc<dyn QuoteSession> {
        let session = Arc::new(SimulatedSession {
            login,
            host: host.to_string(),
            port,
            server: Arc::clone(&self.state),
            connected: AtomicBool::new(false),
            handshake_pending: AtomicBool::new(false),
            handlers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            delivery: Mutex::new(EventDelivery::default()),
            disconnect_calls: AtomicU32::new(0),
        });
        self.state.sessions.lock().push(Arc::clone(&session));
        session
    }
}

/// A session on the in-process quote server.
pub struct SimulatedSession {
    login: i32,
    host: String,
    port: u16,
    server: Arc<ServerState>,
    connected: AtomicBool,
    handshake_pending: AtomicBool,
    handlers: Mutex<Vec<(SubscriptionId, DisconnectHandler)>>,
    next_subscription: AtomicU64,
    delivery: Mutex<EventDelivery>,
    disconnect_calls: AtomicU32,
}

impl SimulatedSession {
    /// Login the session was created for.
    #[must_use]
    pub const fn login(&self) -> i32 {
        self.login
    }

    /// Host the session was created for.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port the session was created for.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Finish a handshake held back by `set_handshake_completes(false)`.
    pub fn complete_handshake(&self) {
        if self.handshake_pending.swap(false, Ordering::SeqCst) {
            self.connected.store(true, Ordering::SeqCst);
        }
    }

    /// Drop the connection from the server side and signal subscribers.
    pub fn drop_connection(&self, reason: &str) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.emit_disconnect(reason);
        }
    }

    /// Fire the disconnect signal regardless of connection state.
    pub fn emit_disconnect(&self, reason: &str) {
        // Handlers may unsubscribe themselves, so call them outside the lock.
        let handlers: Vec<DisconnectHandler> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        let signal = RemoteDisconnect {
            reason: reason.to_string(),
        };
        for handler in handlers {
            handler(&signal);
        }
    }

    /// Registered disconnect callbacks.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// How many times `disconnect` was called.
    #[must_use]
    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Configured event delivery.
    #[must_use]
    pub fn event_delivery(&self) -> EventDelivery {
        *self.delivery.lock()
    }

    fn ensure_connected(&self) -> Result<(), RemoteFault> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteFault::client(NOT_CONNECTED))
        }
    }
}

impl QuoteSession for SimulatedSession {
    fn connect(&self) -> Result<(), RemoteFault> {
        if let Some(fault) = self.server.connect_faults.lock().pop_front() {
            return Err(fault);
        }
        if self.server.manual_handshake.load(Ordering::SeqCst) {
            self.handshake_pending.store(true, Ordering::SeqCst);
        } else {
            self.connected.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn disconnect(&self) {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.handshake_pending.store(false, Ordering::SeqCst);
        self.drop_connection(CLIENT_DISCONNECT_REASON);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_event_delivery(&self, delivery: EventDelivery) -> Result<(), RemoteFault> {
        *self.delivery.lock() = delivery;
        Ok(())
    }

    fn subscribe_disconnect(
        &self,
        handler: DisconnectHandler,
    ) -> Result<SubscriptionId, RemoteFault> {
        if let Some(fault) = self.server.subscribe_faults.lock().pop_front() {
            return Err(fault);
        }
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.handlers.lock().push((id, handler));
        Ok(id)
    }

    fn unsubscribe_disconnect(&self, id: SubscriptionId) {
        self.handlers.lock().retain(|(existing, _)| *existing != id);
    }

    fn get_quote(&self, symbol: &str) -> Option<RemoteQuote> {
        self.server.quote_requests.fetch_add(1, Ordering::SeqCst);
        if !self.is_connected() {
            return None;
        }
        let mut quotes = self.server.quotes.lock();
        let staged = quotes.get_mut(symbol)?;
        if staged.misses_remaining > 0 {
            staged.misses_remaining -= 1;
            return None;
        }
        Some(staged.quote.clone())
    }

    fn opened_orders(&self) -> Result<Vec<RemoteOrder>, RemoteFault> {
        self.server.open_order_requests.fetch_add(1, Ordering::SeqCst);
        self.ensure_connected()?;
        let gate = self.server.open_orders_gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass();
        }
        Ok(self.server.open_orders.read().clone())
    }

    fn download_order_history(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<RemoteOrder>, RemoteFault> {
        self.server.history_requests.fetch_add(1, Ordering::SeqCst);
        self.ensure_connected()?;
        if let Some(fault) = self.server.history_faults.lock().pop_front() {
            return Err(fault);
        }
        Ok(self
            .server
            .history
            .read()
            .iter()
            .filter(|order| order.close_time >= from && order.close_time <= to)
            .cloned()
            .collect())
    }

    fn server_time(&self) -> Result<NaiveDateTime, RemoteFault> {
        self.ensure_connected()?;
        Ok(self.server.now())
    }
}
