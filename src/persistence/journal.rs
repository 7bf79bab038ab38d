use crate::domain::entities::order::OrderSide;
use crate::domain::entities::position::{Position, PositionSide};
use crate::domain::entities::trade::{TradeRecord, TradeStatus};
use crate::domain::errors::ValidationError;
use crate::domain::services::risk_manager::AccountActivity;
use crate::persistence::{load_json, save_json, StoreError};
use chrono::{DateTime, Datelike, Utc};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no open trade for symbol {0}")]
    NoOpenTrade(String),
}

/// Aggregate statistics over closed trades. `profit_factor` is `None`
/// when there are no losing trades, which callers render as infinite.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalStatistics {
    pub total_trades: usize,
    pub open_trades: usize,
    pub closed_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: Option<f64>,
    pub total_pnl: f64,
    pub profit_factor: Option<f64>,
}

/// Append-only trade record store with in-place close updates. Closes
/// match the oldest open record for the symbol first.
pub struct TradingJournal {
    path: PathBuf,
    records: Vec<TradeRecord>,
}

impl TradingJournal {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = load_json(&path)?;
        Ok(TradingJournal { path, records })
    }

    pub fn add_trade(&mut self, record: TradeRecord) -> Result<(), JournalError> {
        info!(symbol = %record.symbol, side = %record.side, size = record.size, entry = record.entry_price, "trade recorded");
        self.records.push(record);
        self.save()?;
        Ok(())
    }

    /// Closes the oldest open record for `symbol` at `exit_price` and
    /// returns its realized P&L.
    pub fn close_trade(
        &mut self,
        symbol: &str,
        exit_price: f64,
        now: DateTime<Utc>,
    ) -> Result<f64, JournalError> {
        let record = self
            .records
            .iter_mut()
            .filter(|r| r.symbol == symbol && r.status == TradeStatus::Open)
            .min_by_key(|r| r.opened_at)
            .ok_or_else(|| JournalError::NoOpenTrade(symbol.to_string()))?;
        let pnl = record.close(exit_price, now)?;
        info!(symbol, exit_price, pnl, "trade closed");
        self.save()?;
        Ok(pnl)
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    /// Open records for `symbol`, viewed as positions (oldest first).
    pub fn open_positions(&self, symbol: &str) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .records
            .iter()
            .filter(|r| r.symbol == symbol && r.status == TradeStatus::Open)
            .filter_map(|r| {
                let side = match r.side {
                    OrderSide::Buy => PositionSide::Long,
                    OrderSide::Sell => PositionSide::Short,
                };
                Position::open(&r.symbol, side, r.entry_price, r.size, 1.0, r.opened_at).ok()
            })
            .collect();
        positions.sort_by_key(|p| p.opened_at);
        positions
    }

    /// Size-weighted average entry price over open records for `symbol`.
    pub fn average_entry(&self, symbol: &str) -> Option<f64> {
        let open: Vec<&TradeRecord> = self
            .records
            .iter()
            .filter(|r| r.symbol == symbol && r.status == TradeStatus::Open)
            .collect();
        let total_size: f64 = open.iter().map(|r| r.size).sum();
        if total_size <= 0.0 {
            return None;
        }
        Some(open.iter().map(|r| r.entry_price * r.size).sum::<f64>() / total_size)
    }

    /// Counters for the risk manager's trade-rate guard, scoped to the
    /// calendar day of `now`.
    pub fn activity(&self, symbol: &str, now: DateTime<Utc>) -> AccountActivity {
        let same_day = |t: DateTime<Utc>| {
            t.year() == now.year() && t.ordinal() == now.ordinal()
        };
        let daily_trades = self
            .records
            .iter()
            .filter(|r| r.symbol == symbol && same_day(r.opened_at))
            .count() as u32;
        let daily_pnl = self
            .records
            .iter()
            .filter(|r| r.symbol == symbol && r.closed_at.map(same_day).unwrap_or(false))
            .filter_map(|r| r.pnl)
            .sum();
        let open_positions = self
            .records
            .iter()
            .filter(|r| r.symbol == symbol && r.status == TradeStatus::Open)
            .count();
        AccountActivity {
            daily_trades,
            daily_pnl,
            open_positions,
        }
    }

    pub fn statistics(&self) -> JournalStatistics {
        let closed: Vec<&TradeRecord> = self
            .records
            .iter()
            .filter(|r| r.status == TradeStatus::Closed)
            .collect();
        let pnls: Vec<f64> = closed.iter().filter_map(|r| r.pnl).collect();
        let wins = pnls.iter().filter(|&&p| p > 0.0).count();
        let losses = pnls.iter().filter(|&&p| p < 0.0).count();
        let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
        let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).sum();

        JournalStatistics {
            total_trades: self.records.len(),
            open_trades: self.records.len() - closed.len(),
            closed_trades: closed.len(),
            wins,
            losses,
            win_rate: if closed.is_empty() {
                None
            } else {
                Some(wins as f64 / closed.len() as f64)
            },
            total_pnl: pnls.iter().sum(),
            profit_factor: if gross_loss == 0.0 {
                None
            } else {
                Some(gross_profit / gross_loss.abs())
            },
        }
    }

    fn save(&self) -> Result<(), StoreError> {
        save_json(&self.path, &self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn journal(dir: &tempfile::TempDir) -> TradingJournal {
        TradingJournal::open(dir.path().join("trades.json")).unwrap()
    }

    fn buy(symbol: &str, size: f64, entry: f64, at: DateTime<Utc>) -> TradeRecord {
        TradeRecord::open(symbol, OrderSide::Buy, size, entry, 0.0, at, "").unwrap()
    }

    #[test]
    fn test_fifo_close_matches_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir);
        let now = Utc::now();
        j.add_trade(buy("BTC-USDT", 1.0, 100.0, now - Duration::days(2))).unwrap();
        j.add_trade(buy("BTC-USDT", 1.0, 200.0, now)).unwrap();

        // oldest entry (100) closes first
        let pnl = j.close_trade("BTC-USDT", 150.0, now).unwrap();
        assert!((pnl - 50.0).abs() < 1e-9);

        let pnl = j.close_trade("BTC-USDT", 150.0, now).unwrap();
        assert!((pnl - (-50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_close_without_open_trade() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir);
        assert!(matches!(
            j.close_trade("BTC-USDT", 100.0, Utc::now()),
            Err(JournalError::NoOpenTrade(_))
        ));
    }

    #[test]
    fn test_statistics_win_rate_and_profit_factor() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir);
        let now = Utc::now();
        // one win of +100, one loss of -50
        j.add_trade(buy("BTC-USDT", 1.0, 100.0, now - Duration::hours(2))).unwrap();
        j.close_trade("BTC-USDT", 200.0, now).unwrap();
        j.add_trade(buy("BTC-USDT", 1.0, 100.0, now - Duration::hours(1))).unwrap();
        j.close_trade("BTC-USDT", 50.0, now).unwrap();

        let stats = j.statistics();
        assert_eq!(stats.win_rate, Some(0.5));
        assert_eq!(stats.profit_factor, Some(2.0));
        assert!((stats.total_pnl - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_profit_factor_sentinel_without_losses() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir);
        let now = Utc::now();
        j.add_trade(buy("BTC-USDT", 1.0, 100.0, now)).unwrap();
        j.close_trade("BTC-USDT", 200.0, now).unwrap();
        assert_eq!(j.statistics().profit_factor, None);
    }

    #[test]
    fn test_journal_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        {
            let mut j = journal(&dir);
            j.add_trade(buy("BTC-USDT", 0.5, 66000.0, now)).unwrap();
        }
        let j = journal(&dir);
        assert_eq!(j.records().len(), 1);
        assert_eq!(j.open_positions("BTC-USDT").len(), 1);
    }

    #[test]
    fn test_average_entry_weighted() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir);
        let now = Utc::now();
        j.add_trade(buy("BTC-USDT", 1.0, 100.0, now)).unwrap();
        j.add_trade(buy("BTC-USDT", 3.0, 200.0, now)).unwrap();
        let avg = j.average_entry("BTC-USDT").unwrap();
        assert!((avg - 175.0).abs() < 1e-9);
    }

    #[test]
    fn test_activity_counters() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = journal(&dir);
        let now = Utc::now();
        j.add_trade(buy("BTC-USDT", 1.0, 100.0, now)).unwrap();
        j.add_trade(buy("BTC-USDT", 1.0, 100.0, now - Duration::days(2))).unwrap();
        j.close_trade("BTC-USDT", 150.0, now).unwrap();

        let activity = j.activity("BTC-USDT", now);
        assert_eq!(activity.daily_trades, 1);
        assert_eq!(activity.open_positions, 1);
        assert!((activity.daily_pnl - 50.0).abs() < 1e-9);
    }
}
