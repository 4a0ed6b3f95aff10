//! Quote Client Port (Driven Port)
//!
//! The adapter's only dependency: an opaque client for the remote quote
//! server. Calls are synchronous. Queries may block, so the adapter moves
//! them off the async scheduler; setup and teardown return promptly.
//!
//! The wire model here mirrors what the server hands back. Numeric codes stay
//! raw `i32` and times stay in naive server time; the record mapper owns the
//! translation into domain types.

use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Wire Model
// ============================================================================

/// An order as returned by the remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrder {
    /// Ticket.
    pub ticket: i32,
    /// Raw operation type code.
    pub order_type: i32,
    /// Raw lifecycle state code from the extended order data, if present.
    pub state: Option<i32>,
    /// Magic number.
    pub magic_number: i32,
    /// Volume in lots.
    pub lots: Decimal,
    /// Open time in server time.
    pub open_time: NaiveDateTime,
    /// Open price.
    pub open_price: Decimal,
    /// Symbol.
    pub symbol: String,
    /// Comment.
    pub comment: String,
    /// Close time in server time.
    pub close_time: NaiveDateTime,
    /// Profit.
    pub profit: Decimal,
    /// Take-profit price.
    pub take_profit: Decimal,
    /// Commission.
    pub commission: Decimal,
    /// Stop-loss price.
    pub stop_loss: Decimal,
    /// Swap.
    pub swap: Decimal,
    /// Close price.
    pub close_price: Decimal,
    /// Raw placement reason code.
    pub placed_reason: i32,
}

/// A quote as returned by the remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteQuote {
    /// Symbol.
    pub symbol: String,
    /// Bid.
    pub bid: Decimal,
    /// Ask.
    pub ask: Decimal,
    /// Quote time in server time.
    pub time: NaiveDateTime,
}

/// Payload of the remote disconnect signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDisconnect {
    /// Reason reported by the client.
    pub reason: String,
}

/// Which layer of the remote client raised a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOrigin {
    /// The connector layer. Its faults wrap the real cause as `inner`.
    Connector,
    /// Any other part of the client.
    Client,
}

/// A fault raised by the remote client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteFault {
    /// Fault message.
    pub message: String,
    /// Originating layer.
    pub origin: FaultOrigin,
    /// Wrapped cause.
    #[source]
    pub inner: Option<Box<RemoteFault>>,
}

impl RemoteFault {
    /// Create a fault raised by the connector layer.
    pub fn connector(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            origin: FaultOrigin::Connector,
            inner: None,
        }
    }

    /// Create a fault raised by the client.
    pub fn client(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            origin: FaultOrigin::Client,
            inner: None,
        }
    }

    /// Attach a wrapped cause.
    #[must_use]
    pub fn with_inner(mut self, inner: Self) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Best-effort human readable cause.
    ///
    /// Connector faults are wrappers, so their inner message is preferred
    /// when one is present. Everything else reports its own message.
    #[must_use]
    pub fn diagnostic_message(&self) -> &str {
        match (&self.origin, &self.inner) {
            (FaultOrigin::Connector, Some(inner)) => &inner.message,
            _ => &self.message,
        }
    }
}

// ============================================================================
// Capability
// ============================================================================

/// Handle returned when registering a disconnect callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Callback invoked by the client when the session drops.
pub type DisconnectHandler = Arc<dyn Fn(&RemoteDisconnect) + Send + Sync>;

/// How the client delivers events to registered callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventDelivery {
    /// Whatever the client does by default.
    #[default]
    Unspecified,
    /// All callbacks run on one dedicated delivery context, never concurrently.
    SingleThread,
}

/// Factory for remote sessions.
pub trait QuoteConnector: Send + Sync {
    /// Build a session handle. No network activity happens until `connect`.
    fn create_session(
        &self,
        login: i32,
        password: &str,
        host: &str,
        port: u16,
    ) -> Arc<dyn QuoteSession>;
}

/// One session to the remote quote server.
///
/// Session setup and teardown (`connect`, `disconnect`, `is_connected`,
/// `set_event_delivery` and the disconnect subscription calls) must return
/// promptly without waiting on the network; handshake completion is
/// asynchronous. The queries may block on network I/O.
pub trait QuoteSession: Send + Sync {
    /// Initiate the handshake. Returns once initiation succeeded; completion
    /// is observed through `is_connected`.
    fn connect(&self) -> Result<(), RemoteFault>;

    /// Close the session without waiting for the server. Safe to call in any
    /// state.
    fn disconnect(&self);

    /// Whether the handshake has completed and the session is up.
    fn is_connected(&self) -> bool;

    /// Configure callback delivery.
    fn set_event_delivery(&self, delivery: EventDelivery) -> Result<(), RemoteFault>;

    /// Register a disconnect callback.
    fn subscribe_disconnect(&self, handler: DisconnectHandler)
    -> Result<SubscriptionId, RemoteFault>;

    /// Remove a disconnect callback. Unknown ids are ignored.
    fn unsubscribe_disconnect(&self, id: SubscriptionId);

    /// Current quote for a symbol, or `None` when the server has none yet.
    fn get_quote(&self, symbol: &str) -> Option<RemoteQuote>;

    /// All currently open orders.
    fn opened_orders(&self) -> Result<Vec<RemoteOrder>, RemoteFault>;

    /// Orders closed between `from` and `to`, in server time.
    fn download_order_history(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<RemoteOrder>, RemoteFault>;

    /// The server's current time.
    fn server_time(&self) -> Result<NaiveDateTime, RemoteFault>;
}
