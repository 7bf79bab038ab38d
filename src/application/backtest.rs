use crate::config::AppConfig;
use crate::domain::entities::order::OrderSide;
use crate::domain::entities::position::{Position, PositionSide};
use crate::domain::errors::ValidationError;
use crate::domain::services::risk_manager::RiskManager;
use crate::domain::services::strategy_engine::{
    MarketView, OrderSizing, StrategyEngine, StrategyState,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("failed to read price data: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("price series is empty")]
    EmptySeries,
}

/// One OHLC candle from the input file. Strategy evaluation uses the
/// close price.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceRow {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub ticks: usize,
    pub buys: usize,
    pub sells: usize,
    pub final_equity: f64,
    pub total_return: f64,
    pub win_rate: Option<f64>,
    pub profit_factor: Option<f64>,
    pub max_drawdown: f64,
}

struct SimPosition {
    size: f64,
    entry: f64,
    opened_at: DateTime<Utc>,
}

/// Replays a historical price series through the same strategy engine and
/// risk manager the live loop uses. Fills are simulated at the close
/// price with no fees or slippage.
pub struct Backtester {
    config: AppConfig,
    initial_balance: f64,
}

impl Backtester {
    pub fn new(config: AppConfig, initial_balance: f64) -> Self {
        Backtester {
            config,
            initial_balance,
        }
    }

    pub fn run_file(&self, path: &Path) -> Result<BacktestReport, BacktestError> {
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<PriceRow>, _>>()?;
        self.run(&rows)
    }

    pub fn run(&self, rows: &[PriceRow]) -> Result<BacktestReport, BacktestError> {
        if rows.is_empty() {
            return Err(BacktestError::EmptySeries);
        }
        let symbol = self.config.strategy.symbol.clone();
        let risk = RiskManager::new(self.config.risk.clone());
        let mut engine =
            StrategyEngine::new(self.config.strategy.clone(), StrategyState::default());

        let mut cash = self.initial_balance;
        let mut holdings: Vec<SimPosition> = Vec::new();
        let mut closed_pnls: Vec<f64> = Vec::new();
        let mut buys = 0usize;
        let mut sells = 0usize;
        let mut peak_equity = self.initial_balance;
        let mut max_drawdown = 0.0f64;

        for row in rows {
            let price = row.close;
            let positions: Vec<Position> = holdings
                .iter()
                .filter_map(|h| {
                    Position::open(&symbol, PositionSide::Long, h.entry, h.size, 1.0, h.opened_at)
                        .ok()
                })
                .collect();
            let view = MarketView {
                symbol: &symbol,
                price,
                now: row.timestamp,
                open_positions: &positions,
            };
            let decisions = engine.evaluate(&view);

            for decision in decisions {
                let size = match decision.sizing {
                    OrderSizing::QuoteAmount(amount) => amount / price,
                    OrderSizing::BaseSize(size) => size,
                };
                let order_value = size * price;
                match decision.side {
                    OrderSide::Buy => {
                        let checked = risk.check_order_size(order_value, cash.max(f64::EPSILON))?;
                        if !checked.accepted || order_value > cash {
                            debug!(reason = %checked.reason, "backtest buy skipped");
                            continue;
                        }
                        cash -= order_value;
                        holdings.push(SimPosition {
                            size,
                            entry: price,
                            opened_at: row.timestamp,
                        });
                        buys += 1;
                        engine.confirm_executed(&decision, row.timestamp);
                    }
                    OrderSide::Sell => {
                        if holdings.is_empty() {
                            continue;
                        }
                        // FIFO, same as the live journal
                        let oldest = holdings.remove(0);
                        cash += oldest.size * price;
                        closed_pnls.push((price - oldest.entry) * oldest.size);
                        sells += 1;
                        engine.confirm_executed(&decision, row.timestamp);
                    }
                }
            }

            let equity = cash + holdings.iter().map(|h| h.size * price).sum::<f64>();
            peak_equity = peak_equity.max(equity);
            if peak_equity > 0.0 {
                max_drawdown = max_drawdown.max((peak_equity - equity) / peak_equity);
            }
        }

        let last_price = rows.last().map(|r| r.close).unwrap_or(0.0);
        let final_equity =
            cash + holdings.iter().map(|h| h.size * last_price).sum::<f64>();
        let wins = closed_pnls.iter().filter(|&&p| p > 0.0).count();
        let losses = closed_pnls.iter().filter(|&&p| p < 0.0).count();
        let gross_profit: f64 = closed_pnls.iter().filter(|&&p| p > 0.0).sum();
        let gross_loss: f64 = closed_pnls.iter().filter(|&&p| p < 0.0).sum();

        Ok(BacktestReport {
            ticks: rows.len(),
            buys,
            sells,
            final_equity,
            total_return: (final_equity - self.initial_balance) / self.initial_balance,
            win_rate: if closed_pnls.is_empty() {
                None
            } else {
                Some(wins as f64 / closed_pnls.len() as f64)
            },
            profit_factor: if losses == 0 {
                None
            } else {
                Some(gross_profit / gross_loss.abs())
            },
            max_drawdown,
        })
    }
}
