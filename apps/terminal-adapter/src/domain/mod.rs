//! Domain Layer - Trade records and account identity.
//!
//! This layer contains the normalized trade-record model the rest of the
//! application consumes, independent of the remote quote server's own
//! representation. No I/O happens here.

/// Account identity and connection credentials.
pub mod account;

/// Trade records, code tables and quotes.
pub mod trading;

/// Session lifecycle state and disconnect events.
pub mod session;
