//! Terminal
//!
//! The adapter that owns the quote-server session, plus the mapping from the
//! server's order model to trade records.

mod adapter;
mod mapper;
mod session;

pub use adapter::TerminalAdapter;
pub use mapper::RecordMapper;
