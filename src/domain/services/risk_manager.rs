use crate::config::RiskConfig;
use crate::domain::entities::position::PositionSide;
use crate::domain::errors::ValidationError;
use tracing::warn;

/// Outcome of a pre-trade risk check. A rejection is a normal decision,
/// not an error; `reason` explains it for logging and the journal note.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskDecision {
    pub accepted: bool,
    pub reason: String,
}

impl RiskDecision {
    fn accept() -> Self {
        RiskDecision {
            accepted: true,
            reason: String::new(),
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        RiskDecision {
            accepted: false,
            reason: reason.into(),
        }
    }
}

/// Result of leverage validation. Excessive leverage is clamped to the
/// configured maximum rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeverageDecision {
    pub effective: f64,
    pub clamped: bool,
}

/// Rolling account activity counters consulted by the trade-rate guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountActivity {
    pub daily_trades: u32,
    pub daily_pnl: f64,
    pub open_positions: usize,
}

/// Pre-trade risk checks: position sizing, order value limits, leverage
/// clamping and protective price levels.
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        RiskManager { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Checks a prospective order's notional value against the account
    /// balance. Rejects orders above the configured fraction of the balance
    /// and orders below the exchange minimum notional.
    pub fn check_order_size(
        &self,
        order_value: f64,
        balance: f64,
    ) -> Result<RiskDecision, ValidationError> {
        if !order_value.is_finite() || order_value <= 0.0 {
            return Err(ValidationError::input("order value must be positive"));
        }
        if !balance.is_finite() || balance <= 0.0 {
            return Err(ValidationError::input("balance must be positive"));
        }
        let limit = balance * self.config.max_position_ratio;
        if order_value > limit {
            return Ok(RiskDecision::reject(format!(
                "order value {:.2} exceeds limit {:.2} ({:.0}% of balance)",
                order_value,
                limit,
                self.config.max_position_ratio * 100.0
            )));
        }
        // small tolerance so a spend converted through a price round-trip
        // does not miss the threshold by one ulp
        if order_value + 1e-9 < self.config.min_order_value {
            return Ok(RiskDecision::reject(format!(
                "order value {:.2} below exchange minimum {:.2}",
                order_value, self.config.min_order_value
            )));
        }
        Ok(RiskDecision::accept())
    }

    /// Clamps requested leverage into `[1, max_leverage]`.
    pub fn clamp_leverage(&self, requested: f64) -> Result<LeverageDecision, ValidationError> {
        if !requested.is_finite() || requested <= 0.0 {
            return Err(ValidationError::input("leverage must be positive"));
        }
        let max = self.config.max_leverage;
        if requested > max {
            warn!(requested, max, "leverage clamped to configured maximum");
            return Ok(LeverageDecision {
                effective: max,
                clamped: true,
            });
        }
        Ok(LeverageDecision {
            effective: requested.max(1.0),
            clamped: requested < 1.0,
        })
    }

    /// Position size in base units such that losing the full distance from
    /// entry to stop costs `risk_per_trade` of the balance.
    pub fn calculate_position_size(
        &self,
        balance: f64,
        entry_price: f64,
        stop_price: f64,
    ) -> Result<f64, ValidationError> {
        if !balance.is_finite() || balance <= 0.0 {
            return Err(ValidationError::input("balance must be positive"));
        }
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(ValidationError::InvalidPrice);
        }
        if !stop_price.is_finite() || stop_price <= 0.0 {
            return Err(ValidationError::InvalidPrice);
        }
        let distance = (entry_price - stop_price).abs();
        if distance == 0.0 {
            return Err(ValidationError::input(
                "entry and stop price must differ",
            ));
        }
        let risk_amount = balance * self.config.risk_per_trade;
        Ok(risk_amount / distance)
    }

    /// Protective stop for a fresh position at `entry_price`.
    pub fn stop_loss_price(
        &self,
        entry_price: f64,
        side: PositionSide,
    ) -> Result<f64, ValidationError> {
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(ValidationError::InvalidPrice);
        }
        let pct = self.config.stop_loss_pct;
        Ok(match side {
            PositionSide::Long => entry_price * (1.0 - pct),
            PositionSide::Short => entry_price * (1.0 + pct),
        })
    }

    /// Profit target for a fresh position at `entry_price`.
    pub fn take_profit_price(
        &self,
        entry_price: f64,
        side: PositionSide,
    ) -> Result<f64, ValidationError> {
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(ValidationError::InvalidPrice);
        }
        let pct = self.config.take_profit_pct;
        Ok(match side {
            PositionSide::Long => entry_price * (1.0 + pct),
            PositionSide::Short => entry_price * (1.0 - pct),
        })
    }

    /// Reward distance divided by risk distance. Useful for logging the
    /// quality of a setup before entry.
    pub fn risk_reward_ratio(
        &self,
        entry_price: f64,
        stop_price: f64,
        target_price: f64,
    ) -> Result<f64, ValidationError> {
        let risk = (entry_price - stop_price).abs();
        let reward = (target_price - entry_price).abs();
        if risk == 0.0 {
            return Err(ValidationError::input(
                "entry and stop price must differ",
            ));
        }
        Ok(reward / risk)
    }

    /// Trade-rate guard: daily trade cap, daily loss circuit breaker and
    /// the open position ceiling.
    pub fn check_account_activity(
        &self,
        activity: AccountActivity,
        balance: f64,
    ) -> Result<RiskDecision, ValidationError> {
        if !balance.is_finite() || balance <= 0.0 {
            return Err(ValidationError::input("balance must be positive"));
        }
        if activity.daily_trades >= self.config.max_daily_trades {
            return Ok(RiskDecision::reject(format!(
                "daily trade cap reached ({})",
                self.config.max_daily_trades
            )));
        }
        let loss_limit = balance * self.config.max_daily_loss_pct;
        if activity.daily_pnl <= -loss_limit {
            return Ok(RiskDecision::reject(format!(
                "daily loss {:.2} breaches circuit breaker {:.2}",
                activity.daily_pnl, loss_limit
            )));
        }
        if activity.open_positions >= self.config.max_open_positions {
            return Ok(RiskDecision::reject(format!(
                "open position ceiling reached ({})",
                self.config.max_open_positions
            )));
        }
        Ok(RiskDecision::accept())
    }
}
