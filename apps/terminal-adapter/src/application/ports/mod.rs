//! Application Ports (Driver and Driven)
//!
//! - **Driver Port**: `TradingTerminalPort`, how upstream services use a terminal
//! - **Driven Ports**: `QuoteConnector`/`QuoteSession` (the remote quote client)
//!   and `TerminalObserver` (lifecycle hooks)

mod quote_client_port;
mod terminal_observer_port;
mod trading_terminal_port;

pub use quote_client_port::{
    DisconnectHandler, EventDelivery, FaultOrigin, QuoteConnector, QuoteSession, RemoteDisconnect,
    RemoteFault, RemoteOrder, RemoteQuote, SubscriptionId,
};
#[cfg(test)]
pub use terminal_observer_port::MockTerminalObserver;
pub use terminal_observer_port::{NoOpTerminalObserver, TerminalObserver, TradeQuery};
pub use trading_terminal_port::{DISCONNECTED_MESSAGE, TerminalError, TradingTerminalPort};
