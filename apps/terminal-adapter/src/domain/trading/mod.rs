//! Trading domain types.
//!
//! - `TradeRecord`: the normalized trade position
//! - `TradeType`, `TradeState`, `PlacedReason`: code tables for the server's
//!   numeric codes
//! - `Quote`: on-demand bid/ask snapshot

mod codes;
mod quote;
mod trade_record;

pub use codes::{PlacedReason, TradeState, TradeType};
pub use quote::Quote;
pub use trade_record::TradeRecord;
