//! Normalized trade record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::codes::{PlacedReason, TradeState, TradeType};

/// The application's stable representation of a single trade position.
///
/// Produced by the record mapper from the quote server's orders. Records have
/// no identity beyond `ticket` and no relationships to one another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Server-assigned ticket.
    pub ticket: i32,
    /// Operation type.
    pub trade_type: TradeType,
    /// Lifecycle state, when the server reported one.
    pub state: Option<TradeState>,
    /// Strategy/origin tag (magic number).
    pub magic: i32,
    /// Volume in lots.
    pub quantity: Decimal,
    /// Open time.
    pub open_time: DateTime<Utc>,
    /// Open price.
    pub open_price: Decimal,
    /// Instrument symbol.
    pub symbol: String,
    /// Free-text comment.
    pub comment: String,
    /// Close time (epoch when still open).
    pub close_time: DateTime<Utc>,
    /// Realized profit in account currency.
    pub profit: Decimal,
    /// Take-profit price (zero when unset).
    pub take_profit: Decimal,
    /// Commission charged.
    pub commission: Decimal,
    /// Stop-loss price (zero when unset).
    pub stop_loss: Decimal,
    /// Accumulated swap.
    pub swap: Decimal,
    /// Close price (current price while open).
    pub close_price: Decimal,
    /// Placement origin.
    pub placed_reason: PlacedReason,
}

impl TradeRecord {
    /// Profit after commission and swap.
    ///
    /// The server reports commission and swap as signed amounts, so they are
    /// added rather than subtracted.
    #[must_use]
    pub fn net_profit(&self) -> Decimal {
        self.profit + self.commission + self.swap
    }

    /// Whether a stop-loss is attached.
    #[must_use]
    pub fn has_stop_loss(&self) -> bool {
        !self.stop_loss.is_zero()
    }

    /// Whether a take-profit is attached.
    #[must_use]
    pub fn has_take_profit(&self) -> bool {
        !self.take_profit.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TradeRecord {
        TradeRecord {
            ticket: 1001,
            trade_type: TradeType::Buy,
            state: Some(TradeState::OpenNormal),
            magic: 0,
            quantity: Decimal::new(10, 2),
            open_time: DateTime::UNIX_EPOCH,
            open_price: Decimal::new(108_450, 5),
            symbol: "EURUSD".to_string(),
            comment: String::new(),
            close_time: DateTime::UNIX_EPOCH,
            profit: Decimal::new(1250, 2),
            take_profit: Decimal::ZERO,
            commission: Decimal::new(-70, 2),
            stop_loss: Decimal::new(108_000, 5),
            swap: Decimal::new(-15, 2),
            close_price: Decimal::new(108_575, 5),
            placed_reason: PlacedReason::Client,
        }
    }

    #[test]
    fn net_profit_adds_signed_costs() {
        // 12.50 - 0.70 - 0.15
        assert_eq!(record().net_profit(), Decimal::new(1165, 2));
    }

    #[test]
    fn protective_levels() {
        let r = record();
        assert!(r.has_stop_loss());
        assert!(!r.has_take_profit());
    }

    #[test]
    fn serializes_enums_as_snake_case() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["trade_type"], "buy");
        assert_eq!(json["state"], "open_normal");
        assert_eq!(json["placed_reason"], "client");
    }
}
