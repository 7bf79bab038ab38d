use crate::domain::entities::order::{Order, OrderFill};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures reported by the exchange gateways. All of them are recoverable
/// at the execution loop boundary: the tick is skipped and the next
/// scheduled tick retries.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited by exchange")]
    RateLimited,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("rejected by exchange (code {code}): {message}")]
    RejectedByExchange { code: String, message: String },
}

#[derive(Debug, Clone, Copy)]
pub struct PriceQuote {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct Ticker {
    pub last: f64,
    pub high_24h: f64,
    pub low_24h: f64,
}

/// Read-only market data source.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, GatewayError>;
    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, GatewayError>;
}

/// Order submission and account queries.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit_order(&self, order: &Order) -> Result<OrderFill, GatewayError>;
    /// Available quote-currency balance.
    async fn get_balance(&self) -> Result<f64, GatewayError>;
}
