use crate::config::AppConfig;
use crate::domain::entities::order::{Order, OrderSide};
use crate::domain::entities::position::PositionSide;
use crate::domain::entities::trade::TradeRecord;
use crate::domain::errors::ValidationError;
use crate::domain::services::risk_manager::RiskManager;
use crate::domain::services::strategy_engine::{
    MarketView, OrderSizing, StrategyDecision, StrategyEngine, StrategyKind, StrategyState,
};
use crate::domain::services::trailing_stop::{TrailingSignal, TrailingStop};
use crate::infrastructure::gateway::{MarketDataGateway, OrderGateway};
use crate::persistence::alert_store::AlertStore;
use crate::persistence::journal::{JournalError, JournalStatistics, TradingJournal};
use crate::persistence::trailing_store::TrailingStore;
use crate::persistence::{load_json, save_json, StoreError};
use chrono::Utc;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Fatal engine failures. Gateway errors never appear here; they degrade
/// to a skipped tick.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// What one tick did, for logging and the CLI.
#[derive(Debug, Default)]
pub struct TickReport {
    pub skipped: bool,
    pub price: Option<f64>,
    pub alerts_fired: usize,
    pub orders_submitted: usize,
    pub orders_skipped: usize,
    pub orders_failed: usize,
}

/// How one decision fared. Skipped means a risk check said no;
/// Failed means the gateway did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionOutcome {
    Submitted,
    Skipped,
    Failed,
}

/// The per-tick orchestrator: fetch price, advance trailing stops,
/// evaluate alerts, run the strategy engine, submit orders and record
/// the results in the journal.
pub struct TradingEngine<M, O> {
    market: M,
    orders: O,
    risk: RiskManager,
    strategy: StrategyEngine,
    alerts: AlertStore,
    journal: TradingJournal,
    trailing: TrailingStore,
    strategy_state_path: PathBuf,
    config: AppConfig,
}

impl<M: MarketDataGateway, O: OrderGateway> TradingEngine<M, O> {
    pub fn new(market: M, orders: O, config: AppConfig) -> Result<Self, EngineError> {
        let data_dir = PathBuf::from(&config.engine.data_dir);
        let strategy_state_path = data_dir.join("strategy_state.json");
        let state: StrategyState = load_json(&strategy_state_path)?;
        Ok(TradingEngine {
            market,
            orders,
            risk: RiskManager::new(config.risk.clone()),
            strategy: StrategyEngine::new(config.strategy.clone(), state),
            alerts: AlertStore::open(data_dir.join("alerts.json"))?,
            journal: TradingJournal::open(data_dir.join("trades.json"))?,
            trailing: TrailingStore::open(data_dir.join("trailing.json"))?,
            strategy_state_path,
            config,
        })
    }

    pub fn alerts(&mut self) -> &mut AlertStore {
        &mut self.alerts
    }

    pub fn statistics(&self) -> JournalStatistics {
        self.journal.statistics()
    }

    pub fn journal(&self) -> &TradingJournal {
        &self.journal
    }

    pub async fn current_price(&self, symbol: &str) -> Option<f64> {
        match self.market.get_price(symbol).await {
            Ok(quote) => Some(quote.price),
            Err(e) => {
                warn!(symbol, error = %e, "price fetch failed");
                None
            }
        }
    }

    /// Stop-loss and take-profit levels for a hypothetical long entry at
    /// the current price.
    pub async fn protective_levels(&self, symbol: &str) -> Option<(f64, f64, f64)> {
        let price = self.current_price(symbol).await?;
        let stop = self.risk.stop_loss_price(price, PositionSide::Long).ok()?;
        let target = self.risk.take_profit_price(price, PositionSide::Long).ok()?;
        Some((price, stop, target))
    }

    /// Manual market buy of a quote-currency amount, risk-checked the same
    /// way strategy orders are.
    pub async fn manual_buy(&mut self, symbol: &str, quote_amount: f64) -> Result<bool, EngineError> {
        let Some(price) = self.current_price(symbol).await else {
            return Ok(false);
        };
        let decision = StrategyDecision {
            strategy: StrategyKind::Dca,
            side: OrderSide::Buy,
            sizing: OrderSizing::QuoteAmount(quote_amount),
            trigger_level: None,
            grid_cross: None,
            reason: "manual buy".to_string(),
        };
        let Some(balance) = self.fetch_balance().await else {
            return Ok(false);
        };
        let outcome = self
            .execute_decision(&decision, symbol, price, balance, false)
            .await?;
        Ok(outcome == ExecutionOutcome::Submitted)
    }

    /// Manual market sell of a base-unit size, closing the oldest open
    /// journal record.
    pub async fn manual_sell(&mut self, symbol: &str, size: f64) -> Result<bool, EngineError> {
        let Some(price) = self.current_price(symbol).await else {
            return Ok(false);
        };
        let order = Order::market(symbol, OrderSide::Sell, size, price)?;
        match self.orders.submit_order(&order).await {
            Ok(fill) => {
                info!(symbol, size, order_id = %fill.order_id, "manual sell filled");
                if let Err(e) = self.journal.close_trade(symbol, price, Utc::now()) {
                    warn!(symbol, error = %e, "sell filled but journal close failed");
                }
                self.release_trailing_if_flat(symbol)?;
                Ok(true)
            }
            Err(e) => {
                warn!(symbol, error = %e, "manual sell rejected");
                Ok(false)
            }
        }
    }

    /// One full evaluation cycle for the configured symbol.
    pub async fn tick(&mut self) -> Result<TickReport, EngineError> {
        self.tick_with_filter(None).await
    }

    /// One cycle restricted to a single strategy, for CLI single-shot runs.
    pub async fn tick_with_filter(
        &mut self,
        only: Option<StrategyKind>,
    ) -> Result<TickReport, EngineError> {
        let symbol = self.config.strategy.symbol.clone();
        let mut report = TickReport::default();

        let price = match self.market.get_price(&symbol).await {
            Ok(quote) => quote.price,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping tick: price fetch failed");
                report.skipped = true;
                return Ok(report);
            }
        };
        report.price = Some(price);

        self.advance_trailing_stop(&symbol, price).await?;

        let fired = self.alerts.evaluate(&symbol, price)?;
        report.alerts_fired = fired.len();

        let decisions = {
            let open_positions = self.journal.open_positions(&symbol);
            let view = MarketView {
                symbol: &symbol,
                price,
                now: Utc::now(),
                open_positions: &open_positions,
            };
            self.strategy.evaluate_filtered(&view, only)
        };
        self.save_strategy_state()?;

        if decisions.is_empty() {
            return Ok(report);
        }

        let Some(balance) = self.fetch_balance().await else {
            warn!(symbol = %symbol, "skipping strategy orders: balance fetch failed");
            return Ok(report);
        };

        for decision in &decisions {
            match self.execute_decision(decision, &symbol, price, balance, true).await? {
                ExecutionOutcome::Submitted => report.orders_submitted += 1,
                ExecutionOutcome::Skipped => report.orders_skipped += 1,
                ExecutionOutcome::Failed => report.orders_failed += 1,
            }
        }
        Ok(report)
    }

    async fn fetch_balance(&self) -> Option<f64> {
        match self.orders.get_balance().await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!(error = %e, "balance fetch failed");
                None
            }
        }
    }

    /// Feeds the tick price into the symbol's trailing stop, if armed.
    /// A triggered stop sells the oldest open position; nothing is
    /// persisted unless the exit order actually went through.
    async fn advance_trailing_stop(&mut self, symbol: &str, price: f64) -> Result<(), EngineError> {
        let Some(stop) = self.trailing.get(symbol) else {
            return Ok(());
        };
        let mut updated = stop.clone();
        let signal = updated.on_price(price)?;
        match signal {
            TrailingSignal::None => Ok(()),
            TrailingSignal::StopMoved { from, to } => {
                info!(symbol, from, to, "trailing stop ratcheted");
                self.trailing.put(updated)?;
                Ok(())
            }
            TrailingSignal::Exit { stop_price } => {
                let positions = self.journal.open_positions(symbol);
                let Some(oldest) = positions.first() else {
                    // stop outlived its position; drop it
                    self.trailing.remove(symbol)?;
                    return Ok(());
                };
                let order = Order::market(symbol, OrderSide::Sell, oldest.size.value(), price)?;
                match self.orders.submit_order(&order).await {
                    Ok(fill) => {
                        info!(symbol, stop_price, price, order_id = %fill.order_id, "trailing stop exit filled");
                        if let Err(e) = self.journal.close_trade(symbol, price, Utc::now()) {
                            warn!(symbol, error = %e, "exit filled but journal close failed");
                        }
                        self.trailing.remove(symbol)?;
                        Ok(())
                    }
                    Err(e) => {
                        // leave the armed state untouched; next tick retries
                        warn!(symbol, error = %e, "trailing stop exit order failed");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Risk-checks and submits one decision. Rejections are decisions,
    /// not errors.
    async fn execute_decision(
        &mut self,
        decision: &StrategyDecision,
        symbol: &str,
        price: f64,
        balance: f64,
        from_strategy: bool,
    ) -> Result<ExecutionOutcome, EngineError> {
        let size = match decision.sizing {
            OrderSizing::QuoteAmount(amount) => amount / price,
            OrderSizing::BaseSize(size) => size,
        };
        let order_value = size * price;

        if decision.side == OrderSide::Buy {
            let activity = self.journal.activity(symbol, Utc::now());
            let guard = self.risk.check_account_activity(activity, balance)?;
            if !guard.accepted {
                info!(symbol, strategy = %decision.strategy, reason = %guard.reason, "order skipped");
                return Ok(ExecutionOutcome::Skipped);
            }
        }
        let sized = self.risk.check_order_size(order_value, balance)?;
        if !sized.accepted {
            info!(symbol, strategy = %decision.strategy, reason = %sized.reason, "order skipped");
            return Ok(ExecutionOutcome::Skipped);
        }

        let order = Order::market(symbol, decision.side, size, price)?;
        let fill = match self.orders.submit_order(&order).await {
            Ok(fill) => fill,
            Err(e) => {
                warn!(symbol, strategy = %decision.strategy, error = %e, "order submission failed");
                return Ok(ExecutionOutcome::Failed);
            }
        };
        info!(
            symbol,
            strategy = %decision.strategy,
            side = %decision.side,
            size = fill.filled_size,
            price = fill.filled_price,
            order_id = %fill.order_id,
            reason = %decision.reason,
            "order filled"
        );

        let now = Utc::now();
        match decision.side {
            OrderSide::Buy => {
                let record = TradeRecord::open(
                    symbol,
                    OrderSide::Buy,
                    fill.filled_size,
                    fill.filled_price,
                    0.0,
                    now,
                    decision.reason.clone(),
                )?;
                self.journal.add_trade(record)?;
                self.maybe_arm_trailing(symbol, fill.filled_price)?;
            }
            OrderSide::Sell => {
                if let Err(e) = self.journal.close_trade(symbol, fill.filled_price, now) {
                    warn!(symbol, error = %e, "sell filled but journal close failed");
                }
                self.release_trailing_if_flat(symbol)?;
            }
        }

        if from_strategy {
            self.strategy.confirm_executed(decision, now);
            self.save_strategy_state()?;
        }
        Ok(ExecutionOutcome::Submitted)
    }

    /// A sell that closes the last open position leaves its trailing stop
    /// behind; remove it so it cannot fire against a future entry.
    fn release_trailing_if_flat(&mut self, symbol: &str) -> Result<(), EngineError> {
        if self.trailing.get(symbol).is_some()
            && self.journal.open_positions(symbol).is_empty()
        {
            info!(symbol, "position flat, trailing stop released");
            self.trailing.remove(symbol)?;
        }
        Ok(())
    }

    fn maybe_arm_trailing(&mut self, symbol: &str, entry_price: f64) -> Result<(), EngineError> {
        if !self.config.engine.trailing_enabled || self.trailing.get(symbol).is_some() {
            return Ok(());
        }
        let stop = TrailingStop::arm(
            symbol,
            PositionSide::Long,
            entry_price,
            self.config.engine.trail_pct,
        )?;
        info!(symbol, entry_price, stop_price = stop.stop_price, "trailing stop armed");
        self.trailing.put(stop)?;
        Ok(())
    }

    fn save_strategy_state(&self) -> Result<(), StoreError> {
        save_json(&self.strategy_state_path, self.strategy.state())
    }

    /// Runs ticks on a fixed interval until a shutdown signal arrives.
    /// The signal is only honored between ticks; a tick in flight always
    /// finishes so partial order submission is never interrupted.
    pub async fn run_loop(&mut self) -> Result<(), EngineError> {
        let interval_secs = self.config.engine.interval_secs;
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        info!(interval_secs, "entering trading loop");
        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("shutdown signal received, stopping between ticks");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }
            let report = self.tick().await?;
            info!(
                skipped = report.skipped,
                price = report.price,
                alerts = report.alerts_fired,
                submitted = report.orders_submitted,
                skipped_orders = report.orders_skipped,
                failed_orders = report.orders_failed,
                "tick complete"
            );
        }
    }
}
