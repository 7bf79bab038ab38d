use crate::domain::entities::position::PositionSide;
use crate::domain::errors::ValidationError;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingState {
    Armed,
    Triggered,
    Inactive,
}

/// What a price update did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrailingSignal {
    /// No trigger, no ratchet.
    None,
    /// The favorable extreme advanced and the stop followed.
    StopMoved { from: f64, to: f64 },
    /// The stop was breached. The position should be exited.
    Exit { stop_price: f64 },
}

/// Ratcheting stop for one position. The stop only ever moves in the
/// favorable direction; an adverse move of `trail_pct` from the best seen
/// price triggers an exit.
///
/// The full state round-trips through serde so the store can persist it
/// per symbol across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailingStop {
    pub symbol: String,
    pub side: PositionSide,
    pub trail_pct: f64,
    /// Best price seen since arming: highest for longs, lowest for shorts.
    pub extreme_price: f64,
    pub stop_price: f64,
    pub state: TrailingState,
}

impl TrailingStop {
    /// Arms a tracker at the position's entry price.
    pub fn arm(
        symbol: impl Into<String>,
        side: PositionSide,
        entry_price: f64,
        trail_pct: f64,
    ) -> Result<Self, ValidationError> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(ValidationError::InvalidSymbol(symbol));
        }
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(ValidationError::InvalidPrice);
        }
        if !trail_pct.is_finite() || trail_pct <= 0.0 || trail_pct >= 1.0 {
            return Err(ValidationError::input("trail pct must be in (0, 1)"));
        }
        let stop_price = Self::stop_for(side, entry_price, trail_pct);
        Ok(TrailingStop {
            symbol,
            side,
            trail_pct,
            extreme_price: entry_price,
            stop_price,
            state: TrailingState::Armed,
        })
    }

    fn stop_for(side: PositionSide, extreme: f64, trail_pct: f64) -> f64 {
        match side {
            PositionSide::Long => extreme * (1.0 - trail_pct),
            PositionSide::Short => extreme * (1.0 + trail_pct),
        }
    }

    /// Feeds a price update. The trigger check runs before any ratcheting,
    /// so a price that both sets a new extreme and breaches the current
    /// stop cannot happen in one update.
    pub fn on_price(&mut self, price: f64) -> Result<TrailingSignal, ValidationError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(ValidationError::InvalidPrice);
        }
        if self.state != TrailingState::Armed {
            return Ok(TrailingSignal::None);
        }
        let breached = match self.side {
            PositionSide::Long => price <= self.stop_price,
            PositionSide::Short => price >= self.stop_price,
        };
        if breached {
            self.state = TrailingState::Triggered;
            debug!(symbol = %self.symbol, price, stop = self.stop_price, "trailing stop triggered");
            return Ok(TrailingSignal::Exit {
                stop_price: self.stop_price,
            });
        }
        let advanced = match self.side {
            PositionSide::Long => price > self.extreme_price,
            PositionSide::Short => price < self.extreme_price,
        };
        if !advanced {
            return Ok(TrailingSignal::None);
        }
        self.extreme_price = price;
        let candidate = Self::stop_for(self.side, price, self.trail_pct);
        let from = self.stop_price;
        // Monotonic: the stop never retreats even if rounding says otherwise.
        self.stop_price = match self.side {
            PositionSide::Long => candidate.max(self.stop_price),
            PositionSide::Short => candidate.min(self.stop_price),
        };
        if self.stop_price == from {
            return Ok(TrailingSignal::None);
        }
        Ok(TrailingSignal::StopMoved {
            from,
            to: self.stop_price,
        })
    }

    pub fn deactivate(&mut self) {
        self.state = TrailingState::Inactive;
    }

    pub fn is_armed(&self) -> bool {
        self.state == TrailingState::Armed
    }
}
