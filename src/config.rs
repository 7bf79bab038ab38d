use crate::domain::errors::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::info;

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_list(name: &str) -> Option<Vec<f64>> {
    let raw = std::env::var(name).ok()?;
    let levels: Vec<f64> = raw
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect();
    if levels.is_empty() {
        None
    } else {
        Some(levels)
    }
}

/// Risk limits applied before every order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Largest order notional as a fraction of the account balance.
    pub max_position_ratio: f64,
    pub max_leverage: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// Fraction of the balance risked between entry and stop.
    pub risk_per_trade: f64,
    /// Exchange minimum order notional in quote currency.
    pub min_order_value: f64,
    pub max_daily_trades: u32,
    pub max_daily_loss_pct: f64,
    pub max_open_positions: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            max_position_ratio: 0.2,
            max_leverage: 5.0,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.10,
            risk_per_trade: 0.02,
            min_order_value: 5.0,
            max_daily_trades: 10,
            max_daily_loss_pct: 0.1,
            max_open_positions: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcaConfig {
    pub enabled: bool,
    /// Quote-currency amount bought per run.
    pub amount: f64,
    pub interval_days: u32,
}

impl Default for DcaConfig {
    fn default() -> Self {
        DcaConfig {
            enabled: true,
            amount: 5.0,
            interval_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportConfig {
    pub enabled: bool,
    pub amount: f64,
    pub levels: Vec<f64>,
    /// Relative distance from a level that counts as "near".
    pub tolerance: f64,
}

impl Default for SupportConfig {
    fn default() -> Self {
        SupportConfig {
            enabled: true,
            amount: 10.0,
            levels: vec![66000.0, 65000.0, 64000.0],
            tolerance: 0.02,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResistanceConfig {
    pub enabled: bool,
    pub levels: Vec<f64>,
    pub tolerance: f64,
    /// Minimum gain over average entry before a sell is allowed.
    pub min_profit: f64,
}

impl Default for ResistanceConfig {
    fn default() -> Self {
        ResistanceConfig {
            enabled: true,
            levels: vec![67000.0, 68000.0, 70000.0],
            tolerance: 0.02,
            min_profit: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub enabled: bool,
    pub lower: f64,
    pub upper: f64,
    pub step: f64,
    pub amount: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            enabled: false,
            lower: 60000.0,
            upper: 70000.0,
            step: 1000.0,
            amount: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub symbol: String,
    pub dca: DcaConfig,
    pub support: SupportConfig,
    pub resistance: ResistanceConfig,
    pub grid: GridConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            symbol: "BTC-USDT".to_string(),
            dca: DcaConfig::default(),
            support: SupportConfig::default(),
            resistance: ResistanceConfig::default(),
            grid: GridConfig::default(),
        }
    }
}

/// Execution loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub interval_secs: u64,
    /// Directory holding the alert, journal and trailing stop stores.
    pub data_dir: String,
    pub trailing_enabled: bool,
    pub trail_pct: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            interval_secs: 300,
            data_dir: "data".to_string(),
            trailing_enabled: true,
            trail_pct: 0.01,
        }
    }
}

/// Full application configuration. Loaded once at startup, immutable for
/// the lifetime of a run; components borrow the parts they need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub risk: RiskConfig,
    pub strategy: StrategyConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Defaults overlaid with any `BOT_*` environment variables present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(v) = env_parse("BOT_MAX_POSITION_RATIO") {
            config.risk.max_position_ratio = v;
        }
        if let Some(v) = env_parse("BOT_MAX_LEVERAGE") {
            config.risk.max_leverage = v;
        }
        if let Some(v) = env_parse("BOT_STOP_LOSS_PCT") {
            config.risk.stop_loss_pct = v;
        }
        if let Some(v) = env_parse("BOT_TAKE_PROFIT_PCT") {
            config.risk.take_profit_pct = v;
        }
        if let Some(v) = env_parse("BOT_RISK_PER_TRADE") {
            config.risk.risk_per_trade = v;
        }
        if let Some(v) = env_parse("BOT_MAX_DAILY_TRADES") {
            config.risk.max_daily_trades = v;
        }
        if let Some(v) = env_parse("BOT_MAX_OPEN_POSITIONS") {
            config.risk.max_open_positions = v;
        }

        if let Ok(v) = std::env::var("BOT_SYMBOL") {
            if !v.is_empty() {
                config.strategy.symbol = v;
            }
        }
        if let Some(v) = env_parse("BOT_DCA_ENABLED") {
            config.strategy.dca.enabled = v;
        }
        if let Some(v) = env_parse("BOT_DCA_AMOUNT") {
            config.strategy.dca.amount = v;
        }
        if let Some(v) = env_parse("BOT_DCA_INTERVAL_DAYS") {
            config.strategy.dca.interval_days = v;
        }
        if let Some(v) = env_list("BOT_SUPPORT_LEVELS") {
            config.strategy.support.levels = v;
        }
        if let Some(v) = env_parse("BOT_SUPPORT_AMOUNT") {
            config.strategy.support.amount = v;
        }
        if let Some(v) = env_list("BOT_RESISTANCE_LEVELS") {
            config.strategy.resistance.levels = v;
        }
        if let Some(v) = env_parse("BOT_GRID_ENABLED") {
            config.strategy.grid.enabled = v;
        }
        if let Some(v) = env_parse("BOT_GRID_LOWER") {
            config.strategy.grid.lower = v;
        }
        if let Some(v) = env_parse("BOT_GRID_UPPER") {
            config.strategy.grid.upper = v;
        }
        if let Some(v) = env_parse("BOT_GRID_STEP") {
            config.strategy.grid.step = v;
        }

        if let Some(v) = env_parse("BOT_INTERVAL_SECS") {
            config.engine.interval_secs = v;
        }
        if let Ok(v) = std::env::var("BOT_DATA_DIR") {
            if !v.is_empty() {
                config.engine.data_dir = v;
            }
        }
        if let Some(v) = env_parse("BOT_TRAILING_ENABLED") {
            config.engine.trailing_enabled = v;
        }
        if let Some(v) = env_parse("BOT_TRAIL_PCT") {
            config.engine.trail_pct = v;
        }

        config.validate()?;
        info!(symbol = %config.strategy.symbol, interval = config.engine.interval_secs, "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidRiskParameter {
                    name,
                    reason: "must be in (0, 1]".to_string(),
                })
            }
        }

        fraction("max_position_ratio", self.risk.max_position_ratio)?;
        fraction("stop_loss_pct", self.risk.stop_loss_pct)?;
        fraction("take_profit_pct", self.risk.take_profit_pct)?;
        fraction("risk_per_trade", self.risk.risk_per_trade)?;
        fraction("max_daily_loss_pct", self.risk.max_daily_loss_pct)?;
        if !self.risk.max_leverage.is_finite() || self.risk.max_leverage < 1.0 {
            return Err(ConfigError::InvalidRiskParameter {
                name: "max_leverage",
                reason: "must be >= 1".to_string(),
            });
        }
        if self.risk.min_order_value <= 0.0 {
            return Err(ConfigError::InvalidRiskParameter {
                name: "min_order_value",
                reason: "must be positive".to_string(),
            });
        }

        if self.strategy.symbol.is_empty() {
            return Err(ConfigError::InvalidStrategyParameter {
                name: "symbol",
                reason: "must not be empty".to_string(),
            });
        }
        if self.strategy.dca.enabled && self.strategy.dca.interval_days == 0 {
            return Err(ConfigError::InvalidStrategyParameter {
                name: "dca.interval_days",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.strategy.grid.enabled {
            let grid = &self.strategy.grid;
            if grid.upper <= grid.lower || grid.step <= 0.0 || grid.step >= grid.upper - grid.lower
            {
                return Err(ConfigError::InvalidStrategyParameter {
                    name: "grid",
                    reason: "bounds must satisfy lower < upper with 0 < step < upper - lower"
                        .to_string(),
                });
            }
        }
        if !self.engine.trail_pct.is_finite()
            || self.engine.trail_pct <= 0.0
            || self.engine.trail_pct >= 1.0
        {
            return Err(ConfigError::InvalidStrategyParameter {
                name: "trail_pct",
                reason: "must be in (0, 1)".to_string(),
            });
        }
        if self.engine.interval_secs == 0 {
            return Err(ConfigError::InvalidStrategyParameter {
                name: "interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_ratio_above_one() {
        let mut config = AppConfig::default();
        config.risk.max_position_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_grid_bounds() {
        let mut config = AppConfig::default();
        config.strategy.grid.enabled = true;
        config.strategy.grid.lower = 70000.0;
        config.strategy.grid.upper = 60000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_dca_interval() {
        let mut config = AppConfig::default();
        config.strategy.dca.interval_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_sub_unit_leverage_limit() {
        let mut config = AppConfig::default();
        config.risk.max_leverage = 0.5;
        assert!(config.validate().is_err());
    }
}
