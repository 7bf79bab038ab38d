use crate::domain::entities::order::OrderSide;
use crate::domain::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// A single journal entry. Opened by a fill, closed by the matching
/// opposite-side fill under FIFO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: OrderSide,
    pub size: f64,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub fee: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub pnl: Option<f64>,
    pub status: TradeStatus,
    #[serde(default)]
    pub note: String,
}

impl TradeRecord {
    pub fn open(
        symbol: impl Into<String>,
        side: OrderSide,
        size: f64,
        entry_price: f64,
        fee: f64,
        opened_at: DateTime<Utc>,
        note: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(ValidationError::InvalidSymbol(symbol));
        }
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(ValidationError::InvalidPrice);
        }
        if !size.is_finite() || size <= 0.0 {
            return Err(ValidationError::InvalidQuantity);
        }
        if !fee.is_finite() || fee < 0.0 {
            return Err(ValidationError::input("fee must be non-negative"));
        }
        Ok(TradeRecord {
            symbol,
            side,
            size,
            entry_price,
            exit_price: None,
            fee,
            opened_at,
            closed_at: None,
            pnl: None,
            status: TradeStatus::Open,
            note: note.into(),
        })
    }

    /// Closes the record at `exit_price`, realizing P&L net of the entry fee.
    pub fn close(&mut self, exit_price: f64, closed_at: DateTime<Utc>) -> Result<f64, ValidationError> {
        if self.status == TradeStatus::Closed {
            return Err(ValidationError::input("trade already closed"));
        }
        if !exit_price.is_finite() || exit_price <= 0.0 {
            return Err(ValidationError::InvalidPrice);
        }
        let pnl = (exit_price - self.entry_price) * self.size * self.side.pnl_sign() - self.fee;
        self.exit_price = Some(exit_price);
        self.closed_at = Some(closed_at);
        self.pnl = Some(pnl);
        self.status = TradeStatus::Closed;
        Ok(pnl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(side: OrderSide) -> TradeRecord {
        TradeRecord::open("BTC-USDT", side, 0.01, 66000.0, 0.5, Utc::now(), "").unwrap()
    }

    #[test]
    fn test_close_long_profit() {
        let mut trade = record(OrderSide::Buy);
        let pnl = trade.close(67000.0, Utc::now()).unwrap();
        // (67000 - 66000) * 0.01 - 0.5
        assert!((pnl - 9.5).abs() < 1e-9);
        assert_eq!(trade.status, TradeStatus::Closed);
    }

    #[test]
    fn test_close_short_profit() {
        let mut trade = record(OrderSide::Sell);
        let pnl = trade.close(65000.0, Utc::now()).unwrap();
        assert!((pnl - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_close_twice_rejected() {
        let mut trade = record(OrderSide::Buy);
        trade.close(67000.0, Utc::now()).unwrap();
        assert!(trade.close(68000.0, Utc::now()).is_err());
    }

    #[test]
    fn test_open_rejects_zero_size() {
        let result = TradeRecord::open("BTC-USDT", OrderSide::Buy, 0.0, 66000.0, 0.0, Utc::now(), "");
        assert!(result.is_err());
    }
}
