use crate::domain::errors::ValidationError;
use crate::domain::value_objects::{price::Price, quantity::Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// An open or closed exposure to a symbol.
///
/// Positions are derived from the trading journal's open records; the
/// trailing stop tracker and risk manager reference them during evaluation
/// but never own them.
#[derive(Debug, Clone)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: Price,
    pub size: Quantity,
    pub leverage: f64,
    pub opened_at: DateTime<Utc>,
    pub status: PositionStatus,
}

impl Position {
    pub fn open(
        symbol: impl Into<String>,
        side: PositionSide,
        entry_price: f64,
        size: f64,
        leverage: f64,
        opened_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if !leverage.is_finite() || leverage < 1.0 {
            return Err(ValidationError::input("leverage must be >= 1"));
        }
        Ok(Position {
            symbol: symbol.into(),
            side,
            entry_price: Price::new(entry_price)?,
            size: Quantity::new(size)?,
            leverage,
            opened_at,
            status: PositionStatus::Open,
        })
    }

    pub fn notional(&self) -> f64 {
        self.entry_price.value() * self.size.value()
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        let diff = match self.side {
            PositionSide::Long => current_price - self.entry_price.value(),
            PositionSide::Short => self.entry_price.value() - current_price,
        };
        diff * self.size.value()
    }
}
