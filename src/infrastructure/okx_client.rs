use crate::domain::entities::order::{Order, OrderFill, OrderSide, OrderType};
use crate::domain::errors::ConfigError;
use crate::infrastructure::gateway::{
    GatewayError, MarketDataGateway, OrderGateway, PriceQuote, Ticker,
};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Primary endpoint plus the fallback domain tried on network failures.
const OKX_ENDPOINTS: [&str; 2] = ["https://www.okx.com", "https://okx.com"];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u32 = 4;
const MAX_BACKOFF_SECS: u64 = 10;

/// Stale-timestamp rejection; retried with a fresh signature.
const CODE_STALE_TIMESTAMP: &str = "50102";
const CODE_INSUFFICIENT_FUNDS: &str = "51008";

/// OKX API credentials.
#[derive(Debug, Clone)]
pub struct OkxConfig {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl OkxConfig {
    /// Empty credentials, enough for public market data endpoints.
    pub fn anonymous() -> Self {
        OkxConfig {
            api_key: String::new(),
            api_secret: String::new(),
            passphrase: String::new(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let read = |name: &'static str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };
        Ok(OkxConfig {
            api_key: read("OKX_API_KEY")?,
            api_secret: read("OKX_API_SECRET")?,
            passphrase: read("OKX_PASSPHRASE")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OkxResponse<T> {
    code: String,
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct OkxTickerData {
    last: String,
    #[serde(rename = "high24h")]
    high_24h: String,
    #[serde(rename = "low24h")]
    low_24h: String,
}

#[derive(Debug, Deserialize)]
struct OkxBalanceDetail {
    #[serde(rename = "availBal")]
    avail_bal: String,
}

#[derive(Debug, Deserialize)]
struct OkxBalanceData {
    details: Vec<OkxBalanceDetail>,
}

#[derive(Debug, Deserialize)]
struct OkxOrderData {
    #[serde(rename = "ordId")]
    ord_id: String,
    #[serde(rename = "sCode")]
    s_code: String,
    #[serde(rename = "sMsg", default)]
    s_msg: String,
}

/// REST client for the OKX v5 API. Retries with capped exponential
/// backoff, rotating to the fallback domain on network failures. The
/// execution loop above never retries; all retry policy lives here.
#[derive(Clone)]
pub struct OkxClient {
    client: Client,
    config: OkxConfig,
}

impl OkxClient {
    pub fn new(config: OkxConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(OkxClient { client, config })
    }

    /// ISO-8601 with millisecond precision, as the signature scheme requires.
    fn timestamp() -> String {
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> Result<String, GatewayError> {
        let message = format!("{}{}{}{}", timestamp, method, path, body);
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.as_bytes())
            .map_err(|e| GatewayError::Network(format!("hmac key error: {}", e)))?;
        mac.update(message.as_bytes());
        Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
        authenticated: bool,
    ) -> Result<Vec<T>, GatewayError> {
        let mut last_error = GatewayError::Network("no attempt made".to_string());

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = (1u64 << attempt).min(MAX_BACKOFF_SECS);
                debug!(attempt, backoff, path, "retrying request");
                tokio::time::sleep(Duration::from_secs(backoff)).await;
            }
            let base = OKX_ENDPOINTS[attempt as usize % OKX_ENDPOINTS.len()];
            match self.attempt::<T>(base, method, path, body, authenticated).await {
                Ok(data) => return Ok(data),
                // timeouts, transport errors and throttling are worth retrying
                Err(e @ (GatewayError::Network(_) | GatewayError::Timeout | GatewayError::RateLimited)) => {
                    warn!(attempt, error = %e, path, "request failed");
                    last_error = e;
                }
                Err(GatewayError::RejectedByExchange { ref code, .. })
                    if code == CODE_STALE_TIMESTAMP =>
                {
                    warn!(attempt, path, "stale timestamp, re-signing");
                    last_error = GatewayError::RejectedByExchange {
                        code: CODE_STALE_TIMESTAMP.to_string(),
                        message: "timestamp expired".to_string(),
                    };
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        base: &str,
        method: &str,
        path: &str,
        body: Option<&str>,
        authenticated: bool,
    ) -> Result<Vec<T>, GatewayError> {
        let url = format!("{}{}", base, path);
        let body_str = body.unwrap_or("");

        let mut request = match method {
            "POST" => self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .body(body_str.to_string()),
            _ => self.client.get(&url),
        };

        if authenticated {
            let timestamp = Self::timestamp();
            let signature = self.sign(&timestamp, method, path, body_str)?;
            request = request
                .header("OK-ACCESS-KEY", &self.config.api_key)
                .header("OK-ACCESS-SIGN", signature)
                .header("OK-ACCESS-TIMESTAMP", timestamp)
                .header("OK-ACCESS-PASSPHRASE", &self.config.passphrase);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Network(e.to_string())
            }
        })?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RateLimited);
        }

        let parsed: OkxResponse<T> = response
            .json()
            .await
            .map_err(|e| GatewayError::Network(format!("malformed response: {}", e)))?;

        if parsed.code != "0" {
            return Err(match parsed.code.as_str() {
                CODE_INSUFFICIENT_FUNDS => GatewayError::InsufficientFunds,
                _ => GatewayError::RejectedByExchange {
                    code: parsed.code,
                    message: parsed.msg,
                },
            });
        }
        Ok(parsed.data)
    }

    fn parse_price(raw: &str, field: &str) -> Result<f64, GatewayError> {
        raw.parse()
            .map_err(|_| GatewayError::Network(format!("malformed {} field: {:?}", field, raw)))
    }
}

#[async_trait]
impl MarketDataGateway for OkxClient {
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, GatewayError> {
        let ticker = self.get_ticker(symbol).await?;
        Ok(PriceQuote {
            price: ticker.last,
            timestamp: Utc::now(),
        })
    }

    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, GatewayError> {
        let path = format!("/api/v5/market/ticker?instId={}", symbol);
        let data: Vec<OkxTickerData> = self.request("GET", &path, None, false).await?;
        let ticker = data
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Network(format!("no ticker data for {}", symbol)))?;
        Ok(Ticker {
            last: Self::parse_price(&ticker.last, "last")?,
            high_24h: Self::parse_price(&ticker.high_24h, "high24h")?,
            low_24h: Self::parse_price(&ticker.low_24h, "low24h")?,
        })
    }
}

#[async_trait]
impl OrderGateway for OkxClient {
    async fn submit_order(&self, order: &Order) -> Result<OrderFill, GatewayError> {
        let mut payload = json!({
            "instId": order.symbol,
            "tdMode": "cash",
            "side": order.side.to_string(),
            "sz": order.quantity.value().to_string(),
        });
        match order.order_type {
            OrderType::Market => {
                payload["ordType"] = json!("market");
                // keep sz in base units for market buys too
                if order.side == OrderSide::Buy {
                    payload["tgtCcy"] = json!("base_ccy");
                }
            }
            OrderType::Limit => {
                payload["ordType"] = json!("limit");
                payload["px"] = json!(order.price.value().to_string());
            }
        }
        let body = payload.to_string();
        let data: Vec<OkxOrderData> = self
            .request("POST", "/api/v5/trade/order", Some(&body), true)
            .await?;
        let placed = data
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Network("empty order response".to_string()))?;
        if placed.s_code != "0" {
            return Err(GatewayError::RejectedByExchange {
                code: placed.s_code,
                message: placed.s_msg,
            });
        }
        // OKX does not report the executed price synchronously; echo the
        // reference quote the decision was made against.
        Ok(OrderFill {
            order_id: placed.ord_id,
            filled_price: order.price.value(),
            filled_size: order.quantity.value(),
        })
    }

    async fn get_balance(&self) -> Result<f64, GatewayError> {
        let path = "/api/v5/account/balance?ccy=USDT";
        let data: Vec<OkxBalanceData> = self.request("GET", path, None, true).await?;
        let detail = data
            .into_iter()
            .next()
            .and_then(|account| account.details.into_iter().next())
            .ok_or_else(|| GatewayError::Network("no balance data".to_string()))?;
        Self::parse_price(&detail.avail_bal, "availBal")
    }
}
