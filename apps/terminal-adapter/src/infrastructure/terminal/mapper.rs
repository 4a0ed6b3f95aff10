//! Remote order to trade record translation.

use crate::application::ports::{RemoteOrder, RemoteQuote};
use crate::domain::trading::{PlacedReason, Quote, TradeRecord, TradeState, TradeType};

/// Stateless translation from the quote server's wire model to domain types.
///
/// Total over its input: unknown codes pass through as `Unspecified(code)`
/// and server times are read as UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordMapper;

impl RecordMapper {
    /// Map a single order.
    #[must_use]
    pub fn map_one(order: &RemoteOrder) -> TradeRecord {
        TradeRecord {
            ticket: order.ticket,
            trade_type: TradeType::from_code(order.order_type),
            state: order.state.map(TradeState::from_code),
            magic: order.magic_number,
            quantity: order.lots,
            open_time: order.open_time.and_utc(),
            open_price: order.open_price,
            symbol: order.symbol.clone(),
            comment: order.comment.clone(),
            close_time: order.close_time.and_utc(),
            profit: order.profit,
            take_profit: order.take_profit,
            commission: order.commission,
            stop_loss: order.stop_loss,
            swap: order.swap,
            close_price: order.close_price,
            placed_reason: PlacedReason::from_code(order.placed_reason),
        }
    }

    /// Map a sequence of orders, preserving order and length.
    ///
    /// Each element goes through `map_one`, so bulk results carry `state`
    /// exactly like single-item results.
    #[must_use]
    pub fn map_many(orders: &[RemoteOrder]) -> Vec<TradeRecord> {
        orders.iter().map(Self::map_one).collect()
    }

    /// Map a quote.
    #[must_use]
    pub fn map_quote(quote: &RemoteQuote) -> Quote {
        Quote {
            symbol: quote.symbol.clone(),
            bid: quote.bid,
            ask: quote.ask,
            time: quote.time.and_utc(),
        }
    }
}
