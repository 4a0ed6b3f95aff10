//! Quote client implementations.

mod simulated;

pub use simulated::{
    CLIENT_DISCONNECT_REASON, CallGate, SimulatedQuoteConnector, SimulatedSession,
};
