use crate::domain::errors::ValidationError;
use crate::domain::value_objects::{price::Price, quantity::Quantity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Sign applied to `exit - entry` when computing realized P&L.
    pub fn pnl_sign(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

/// An order request handed to the order submission gateway.
///
/// Market orders carry a reference price (the quote the decision was made
/// against); the gateway echoes it back in the fill since OKX does not
/// return the executed price synchronously.
#[derive(Debug, Clone)]
pub struct Order {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub price: Price,
    pub quantity: Quantity,
}

impl Order {
    pub fn market(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: f64,
        reference_price: f64,
    ) -> Result<Self, ValidationError> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(ValidationError::InvalidSymbol(symbol));
        }
        Ok(Order {
            symbol,
            side,
            order_type: OrderType::Market,
            price: Price::new(reference_price)?,
            quantity: Quantity::new(quantity)?,
        })
    }

    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: f64,
        limit_price: f64,
    ) -> Result<Self, ValidationError> {
        let mut order = Order::market(symbol, side, quantity, limit_price)?;
        order.order_type = OrderType::Limit;
        Ok(order)
    }

    pub fn notional(&self) -> f64 {
        self.price.value() * self.quantity.value()
    }
}

/// Result of a submitted order, as reported by the gateway.
#[derive(Debug, Clone)]
pub struct OrderFill {
    pub order_id: String,
    pub filled_price: f64,
    pub filled_size: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_order() {
        let order = Order::market("BTC-USDT", OrderSide::Buy, 0.001, 66000.0).unwrap();
        assert_eq!(order.symbol, "BTC-USDT");
        assert_eq!(order.order_type, OrderType::Market);
        assert!((order.notional() - 66.0).abs() < 1e-9);
    }

    #[test]
    fn test_limit_order() {
        let order = Order::limit("ETH-USDT", OrderSide::Sell, 0.5, 2000.0).unwrap();
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.price.value(), 2000.0);
    }

    #[test]
    fn test_order_rejects_empty_symbol() {
        assert!(Order::market("", OrderSide::Buy, 1.0, 100.0).is_err());
    }

    #[test]
    fn test_order_rejects_negative_quantity() {
        assert!(Order::market("BTC-USDT", OrderSide::Buy, -1.0, 100.0).is_err());
    }

    #[test]
    fn test_order_rejects_zero_price() {
        assert!(Order::market("BTC-USDT", OrderSide::Buy, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_pnl_sign() {
        assert_eq!(OrderSide::Buy.pnl_sign(), 1.0);
        assert_eq!(OrderSide::Sell.pnl_sign(), -1.0);
    }
}
