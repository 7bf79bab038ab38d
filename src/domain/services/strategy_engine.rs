use crate::config::StrategyConfig;
use crate::domain::entities::order::OrderSide;
use crate::domain::entities::position::Position;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Dca,
    Support,
    Resistance,
    Grid,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Dca => write!(f, "dca"),
            StrategyKind::Support => write!(f, "support"),
            StrategyKind::Resistance => write!(f, "resistance"),
            StrategyKind::Grid => write!(f, "grid"),
        }
    }
}

/// How a decision expresses its size: a quote-currency spend for buys,
/// or an exact base-unit size when closing a held position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderSizing {
    QuoteAmount(f64),
    BaseSize(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridCross {
    Up,
    Down,
}

/// One order the engine wants submitted this tick. The engine's trigger
/// markers only advance once the caller reports the submission succeeded
/// via [`StrategyEngine::confirm_executed`].
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyDecision {
    pub strategy: StrategyKind,
    pub side: OrderSide,
    pub sizing: OrderSizing,
    /// The price level that produced the decision, when one exists.
    pub trigger_level: Option<f64>,
    /// Crossing direction for grid decisions.
    pub grid_cross: Option<GridCross>,
    pub reason: String,
}

/// Persisted engine state. `last_price` and the band-departure markers
/// advance as their strategies are evaluated; the trigger markers
/// (`dca_last_run`, fired levels, grid flags) advance only on confirmed
/// execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyState {
    pub dca_last_run: Option<DateTime<Utc>>,
    /// Support levels that already fired. Each level stays marked until
    /// price leaves that level's own band, so overlapping bands cannot
    /// take turns re-firing while price lingers between them.
    #[serde(default)]
    pub fired_supports: Vec<f64>,
    #[serde(default)]
    pub fired_resistances: Vec<f64>,
    /// Last confirmed crossing direction per grid boundary index.
    #[serde(default)]
    pub grid_crossings: BTreeMap<u32, GridCross>,
    pub last_price: Option<f64>,
}

/// A snapshot of the market handed to the engine each tick.
#[derive(Debug)]
pub struct MarketView<'a> {
    pub symbol: &'a str,
    pub price: f64,
    pub now: DateTime<Utc>,
    pub open_positions: &'a [Position],
}

/// Evaluates the configured strategies in fixed priority order
/// (DCA, support, resistance, grid) against each tick's market view.
#[derive(Debug, Clone)]
pub struct StrategyEngine {
    config: StrategyConfig,
    state: StrategyState,
}

impl StrategyEngine {
    pub fn new(config: StrategyConfig, state: StrategyState) -> Self {
        StrategyEngine { config, state }
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Runs one evaluation pass. Observational state (previous price,
    /// band-departure debounce) advances here; trigger markers do not.
    pub fn evaluate(&mut self, view: &MarketView<'_>) -> Vec<StrategyDecision> {
        self.evaluate_filtered(view, None)
    }

    /// Like [`evaluate`](Self::evaluate) but restricted to one strategy,
    /// for single-shot CLI invocations.
    pub fn evaluate_filtered(
        &mut self,
        view: &MarketView<'_>,
        only: Option<StrategyKind>,
    ) -> Vec<StrategyDecision> {
        let mut decisions = Vec::new();
        let wants = |kind| only.is_none() || only == Some(kind);

        if wants(StrategyKind::Dca) {
            decisions.extend(self.evaluate_dca(view));
        }
        if wants(StrategyKind::Support) {
            decisions.extend(self.evaluate_support(view));
        }
        if wants(StrategyKind::Resistance) {
            decisions.extend(self.evaluate_resistance(view));
        }
        if wants(StrategyKind::Grid) {
            decisions.extend(self.evaluate_grid(view));
        }

        // Observational state only advances for the strategies that ran.
        // In particular a filtered single-shot run must not move
        // `last_price`, or it would consume a grid crossing the loop
        // would otherwise trade.
        if only.is_none() || only == Some(StrategyKind::Support) {
            self.clear_departed_supports(view.price);
        }
        if only.is_none() || only == Some(StrategyKind::Resistance) {
            self.clear_departed_resistances(view.price);
        }
        if only.is_none() {
            self.state.last_price = Some(view.price);
        }
        decisions
    }

    /// Records that a decision's order was actually submitted. This is the
    /// only place trigger markers advance, so a failed submission is simply
    /// retried by the next tick.
    pub fn confirm_executed(&mut self, decision: &StrategyDecision, now: DateTime<Utc>) {
        match decision.strategy {
            StrategyKind::Dca => self.state.dca_last_run = Some(now),
            StrategyKind::Support => {
                if let Some(level) = decision.trigger_level {
                    if !self.state.fired_supports.contains(&level) {
                        self.state.fired_supports.push(level);
                    }
                }
            }
            StrategyKind::Resistance => {
                if let Some(level) = decision.trigger_level {
                    if !self.state.fired_resistances.contains(&level) {
                        self.state.fired_resistances.push(level);
                    }
                }
            }
            StrategyKind::Grid => {
                if let (Some(level), Some(direction)) =
                    (decision.trigger_level, decision.grid_cross)
                {
                    if let Some(index) = self.grid_boundary_index(level) {
                        self.state.grid_crossings.insert(index, direction);
                    }
                }
            }
        }
    }

    fn evaluate_dca(&self, view: &MarketView<'_>) -> Option<StrategyDecision> {
        let dca = &self.config.dca;
        if !dca.enabled {
            return None;
        }
        if let Some(last) = self.state.dca_last_run {
            if view.now - last < Duration::days(dca.interval_days as i64) {
                return None;
            }
        }
        Some(StrategyDecision {
            strategy: StrategyKind::Dca,
            side: OrderSide::Buy,
            sizing: OrderSizing::QuoteAmount(dca.amount),
            trigger_level: None,
            grid_cross: None,
            reason: format!("scheduled buy, interval {}d", dca.interval_days),
        })
    }

    fn in_band(price: f64, level: f64, tolerance: f64) -> bool {
        (price - level).abs() / level <= tolerance
    }

    fn evaluate_support(&self, view: &MarketView<'_>) -> Option<StrategyDecision> {
        let support = &self.config.support;
        if !support.enabled {
            return None;
        }
        for &level in &support.levels {
            if !Self::in_band(view.price, level, support.tolerance) {
                continue;
            }
            if self.state.fired_supports.contains(&level) {
                debug!(level, "support level already fired, waiting for band departure");
                continue;
            }
            return Some(StrategyDecision {
                strategy: StrategyKind::Support,
                side: OrderSide::Buy,
                sizing: OrderSizing::QuoteAmount(support.amount),
                trigger_level: Some(level),
                grid_cross: None,
                reason: format!("price {:.2} near support {:.2}", view.price, level),
            });
        }
        None
    }

    fn evaluate_resistance(&self, view: &MarketView<'_>) -> Option<StrategyDecision> {
        let resistance = &self.config.resistance;
        if !resistance.enabled {
            return None;
        }
        let oldest = view
            .open_positions
            .iter()
            .min_by_key(|position| position.opened_at)?;
        let total_size: f64 = view
            .open_positions
            .iter()
            .map(|position| position.size.value())
            .sum();
        if total_size <= 0.0 {
            return None;
        }
        let avg_entry = view
            .open_positions
            .iter()
            .map(|position| position.entry_price.value() * position.size.value())
            .sum::<f64>()
            / total_size;
        if view.price < avg_entry * (1.0 + resistance.min_profit) {
            return None;
        }
        for &level in &resistance.levels {
            if !Self::in_band(view.price, level, resistance.tolerance) {
                continue;
            }
            if self.state.fired_resistances.contains(&level) {
                continue;
            }
            return Some(StrategyDecision {
                strategy: StrategyKind::Resistance,
                side: OrderSide::Sell,
                sizing: OrderSizing::BaseSize(oldest.size.value()),
                trigger_level: Some(level),
                grid_cross: None,
                reason: format!(
                    "price {:.2} near resistance {:.2}, avg entry {:.2}",
                    view.price, level, avg_entry
                ),
            });
        }
        None
    }

    /// Interior band boundaries, exclusive of the outer bounds.
    fn grid_boundaries(&self) -> Vec<f64> {
        let grid = &self.config.grid;
        if grid.step <= 0.0 || grid.upper <= grid.lower {
            return Vec::new();
        }
        let count = ((grid.upper - grid.lower) / grid.step).floor() as u32;
        (1..count)
            .map(|i| grid.lower + grid.step * i as f64)
            .collect()
    }

    fn grid_boundary_index(&self, level: f64) -> Option<u32> {
        self.grid_boundaries()
            .iter()
            .position(|&b| (b - level).abs() < 1e-9)
            .map(|i| i as u32)
    }

    fn evaluate_grid(&self, view: &MarketView<'_>) -> Option<StrategyDecision> {
        let grid = &self.config.grid;
        if !grid.enabled {
            return None;
        }
        if view.price < grid.lower || view.price > grid.upper {
            return None;
        }
        let last = self.state.last_price?;
        for (index, boundary) in self.grid_boundaries().into_iter().enumerate() {
            let crossed = if last < boundary && view.price >= boundary {
                Some(GridCross::Up)
            } else if last > boundary && view.price <= boundary {
                Some(GridCross::Down)
            } else {
                None
            };
            let Some(direction) = crossed else { continue };
            // Each boundary trades once per direction; a confirmed crossing
            // in the other direction re-arms it.
            if self.state.grid_crossings.get(&(index as u32)) == Some(&direction) {
                continue;
            }
            let side = match direction {
                GridCross::Up => OrderSide::Sell,
                GridCross::Down => OrderSide::Buy,
            };
            return Some(StrategyDecision {
                strategy: StrategyKind::Grid,
                side,
                sizing: OrderSizing::QuoteAmount(grid.amount),
                trigger_level: Some(boundary),
                grid_cross: Some(direction),
                reason: format!(
                    "grid boundary {:.2} crossed {}",
                    boundary,
                    match direction {
                        GridCross::Up => "upward",
                        GridCross::Down => "downward",
                    }
                ),
            });
        }
        None
    }

    /// Re-arms fired levels whose band the price has left. Each level is
    /// cleared individually against its own band.
    fn clear_departed_supports(&mut self, price: f64) {
        let tolerance = self.config.support.tolerance;
        self.state
            .fired_supports
            .retain(|&level| Self::in_band(price, level, tolerance));
    }

    fn clear_departed_resistances(&mut self, price: f64) {
        let tolerance = self.config.resistance.tolerance;
        self.state
            .fired_resistances
            .retain(|&level| Self::in_band(price, level, tolerance));
    }
}
