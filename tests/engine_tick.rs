use async_trait::async_trait;
use chrono::Utc;
use okxbot::application::engine::TradingEngine;
use okxbot::config::AppConfig;
use okxbot::domain::entities::alert::{Alert, AlertDirection};
use okxbot::domain::entities::order::{Order, OrderFill, OrderSide};
use okxbot::infrastructure::gateway::{
    GatewayError, MarketDataGateway, OrderGateway, PriceQuote, Ticker,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct MockMarket {
    prices: Arc<Mutex<Vec<f64>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockMarket {
    fn new(price: f64) -> Self {
        MockMarket {
            prices: Arc::new(Mutex::new(vec![price])),
            fail: Arc::new(Mutex::new(false)),
        }
    }

    fn set_price(&self, price: f64) {
        self.prices.lock().unwrap().push(price);
    }

    fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }

    fn current(&self) -> f64 {
        *self.prices.lock().unwrap().last().unwrap()
    }
}

#[async_trait]
impl MarketDataGateway for MockMarket {
    async fn get_price(&self, _symbol: &str) -> Result<PriceQuote, GatewayError> {
        if *self.fail.lock().unwrap() {
            return Err(GatewayError::Network("mock outage".to_string()));
        }
        Ok(PriceQuote {
            price: self.current(),
            timestamp: Utc::now(),
        })
    }

    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, GatewayError> {
        let quote = self.get_price(symbol).await?;
        Ok(Ticker {
            last: quote.price,
            high_24h: quote.price,
            low_24h: quote.price,
        })
    }
}

#[derive(Clone)]
struct MockOrders {
    balance: Arc<Mutex<f64>>,
    submitted: Arc<Mutex<Vec<(String, OrderSide, f64)>>>,
    reject: Arc<Mutex<bool>>,
    fills: Arc<AtomicUsize>,
}

impl MockOrders {
    fn new(balance: f64) -> Self {
        MockOrders {
            balance: Arc::new(Mutex::new(balance)),
            submitted: Arc::new(Mutex::new(Vec::new())),
            reject: Arc::new(Mutex::new(false)),
            fills: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn set_rejecting(&self, rejecting: bool) {
        *self.reject.lock().unwrap() = rejecting;
    }

    fn submissions(&self) -> Vec<(String, OrderSide, f64)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderGateway for MockOrders {
    async fn submit_order(&self, order: &Order) -> Result<OrderFill, GatewayError> {
        if *self.reject.lock().unwrap() {
            return Err(GatewayError::RejectedByExchange {
                code: "51000".to_string(),
                message: "mock rejection".to_string(),
            });
        }
        self.submitted.lock().unwrap().push((
            order.symbol.clone(),
            order.side,
            order.quantity.value(),
        ));
        let id = self.fills.fetch_add(1, Ordering::SeqCst);
        Ok(OrderFill {
            order_id: format!("mock-{}", id),
            filled_price: order.price.value(),
            filled_size: order.quantity.value(),
        })
    }

    async fn get_balance(&self) -> Result<f64, GatewayError> {
        Ok(*self.balance.lock().unwrap())
    }
}

fn test_config(data_dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.engine.data_dir = data_dir.to_string_lossy().into_owned();
    config.strategy.dca.enabled = false;
    config.strategy.support.enabled = false;
    config.strategy.resistance.enabled = false;
    config.strategy.grid.enabled = false;
    config.engine.trailing_enabled = false;
    config
}

fn engine_with(
    config: AppConfig,
    price: f64,
    balance: f64,
) -> (TradingEngine<MockMarket, MockOrders>, MockMarket, MockOrders) {
    let market = MockMarket::new(price);
    let orders = MockOrders::new(balance);
    let engine = TradingEngine::new(market.clone(), orders.clone(), config).unwrap();
    (engine, market, orders)
}

#[tokio::test]
async fn failed_price_fetch_skips_tick() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, market, orders) = engine_with(test_config(dir.path()), 66000.0, 1000.0);
    market.set_failing(true);

    let report = engine.tick().await.unwrap();
    assert!(report.skipped);
    assert!(orders.submissions().is_empty());

    // recovery on the next tick
    market.set_failing(false);
    let report = engine.tick().await.unwrap();
    assert!(!report.skipped);
    assert_eq!(report.price, Some(66000.0));
}

#[tokio::test]
async fn support_buy_fires_once_while_price_lingers() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.strategy.support.enabled = true;
    config.strategy.support.levels = vec![66000.0];

    let (mut engine, market, orders) = engine_with(config, 65900.0, 1000.0);

    let report = engine.tick().await.unwrap();
    assert_eq!(report.orders_submitted, 1);

    // price stays in the band, no second buy
    market.set_price(65950.0);
    let report = engine.tick().await.unwrap();
    assert_eq!(report.orders_submitted, 0);
    assert_eq!(orders.submissions().len(), 1);

    // leave the band and come back, the level re-arms
    market.set_price(69500.0);
    engine.tick().await.unwrap();
    market.set_price(65900.0);
    let report = engine.tick().await.unwrap();
    assert_eq!(report.orders_submitted, 1);
    assert_eq!(orders.submissions().len(), 2);
}

#[tokio::test]
async fn failed_submission_retries_next_tick() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.strategy.support.enabled = true;

    let (mut engine, _market, orders) = engine_with(config, 65900.0, 1000.0);
    orders.set_rejecting(true);

    let report = engine.tick().await.unwrap();
    assert_eq!(report.orders_submitted, 0);
    assert_eq!(report.orders_failed, 1);
    assert_eq!(report.orders_skipped, 0);

    // the trigger marker never advanced, so the same tick input fires again
    orders.set_rejecting(false);
    let report = engine.tick().await.unwrap();
    assert_eq!(report.orders_submitted, 1);
}

#[tokio::test]
async fn trailing_exit_closes_journal_trade() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.strategy.support.enabled = true;
    config.engine.trailing_enabled = true;
    config.engine.trail_pct = 0.01;

    let (mut engine, market, orders) = engine_with(config, 65900.0, 1000.0);

    // buy near support; the fill arms a trailing stop at 65900
    let report = engine.tick().await.unwrap();
    assert_eq!(report.orders_submitted, 1);
    assert_eq!(engine.journal().open_positions("BTC-USDT").len(), 1);

    // rally ratchets the stop, then a pullback below it exits
    market.set_price(69000.0);
    engine.tick().await.unwrap();
    market.set_price(68000.0);
    engine.tick().await.unwrap();

    assert!(engine.journal().open_positions("BTC-USDT").is_empty());
    let sells: Vec<_> = orders
        .submissions()
        .into_iter()
        .filter(|(_, side, _)| *side == OrderSide::Sell)
        .collect();
    assert_eq!(sells.len(), 1);

    let stats = engine.statistics();
    assert_eq!(stats.closed_trades, 1);
    assert_eq!(stats.wins, 1);
}

#[tokio::test]
async fn alert_fires_once_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    {
        let (mut engine, _market, _orders) = engine_with(config.clone(), 71000.0, 1000.0);
        engine
            .alerts()
            .add(Alert::new("BTC-USDT", 70000.0, AlertDirection::Above).unwrap())
            .unwrap();
        let report = engine.tick().await.unwrap();
        assert_eq!(report.alerts_fired, 1);
    }

    // a fresh engine over the same data directory must not re-fire
    let (mut engine, _market, _orders) = engine_with(config, 72000.0, 1000.0);
    let report = engine.tick().await.unwrap();
    assert_eq!(report.alerts_fired, 0);
}

#[tokio::test]
async fn order_above_position_ratio_is_skipped_not_submitted() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.strategy.support.enabled = true;
    config.strategy.support.amount = 500.0; // 50% of the balance

    let (mut engine, _market, orders) = engine_with(config, 65900.0, 1000.0);
    let report = engine.tick().await.unwrap();
    assert_eq!(report.orders_submitted, 0);
    assert_eq!(report.orders_skipped, 1);
    assert_eq!(report.orders_failed, 0);
    assert!(orders.submissions().is_empty());
}

#[tokio::test]
async fn manual_sell_releases_trailing_stop() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.strategy.support.enabled = true;
    config.strategy.support.levels = vec![66000.0];
    config.engine.trailing_enabled = true;
    config.engine.trail_pct = 0.01;

    let (mut engine, _market, orders) = engine_with(config, 65900.0, 1000.0);

    // the support buy arms a trailing stop for the symbol
    let report = engine.tick().await.unwrap();
    assert_eq!(report.orders_submitted, 1);
    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("trailing.json")).unwrap())
            .unwrap();
    assert!(stored.get("BTC-USDT").is_some());

    // selling the whole position must take the stop with it
    let sold_size = orders.submissions()[0].2;
    assert!(engine.manual_sell("BTC-USDT", sold_size).await.unwrap());
    assert!(engine.journal().open_positions("BTC-USDT").is_empty());
    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("trailing.json")).unwrap())
            .unwrap();
    assert!(stored.get("BTC-USDT").is_none());
}
