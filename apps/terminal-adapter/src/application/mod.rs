//! Application Layer
//!
//! Defines the ports the terminal adapter sits between: the driver port
//! upstream services call, and the driven ports for the remote quote client
//! and lifecycle observation.

pub mod ports;

pub use ports::*;
