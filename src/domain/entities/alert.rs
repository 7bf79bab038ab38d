use crate::domain::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    Above,
    Below,
}

impl std::str::FromStr for AlertDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "above" => Ok(AlertDirection::Above),
            "below" => Ok(AlertDirection::Below),
            other => Err(ValidationError::input(format!(
                "alert direction must be `above` or `below`, got `{}`",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertDirection::Above => write!(f, "above"),
            AlertDirection::Below => write!(f, "below"),
        }
    }
}

/// A persisted price-threshold watch. Once fired it stays fired until an
/// explicit reset, including across process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub symbol: String,
    pub threshold: f64,
    pub direction: AlertDirection,
    pub created_at: DateTime<Utc>,
    pub fired: bool,
}

impl Alert {
    pub fn new(
        symbol: impl Into<String>,
        threshold: f64,
        direction: AlertDirection,
    ) -> Result<Self, ValidationError> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(ValidationError::InvalidSymbol(symbol));
        }
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ValidationError::InvalidPrice);
        }
        Ok(Alert {
            symbol,
            threshold,
            direction,
            created_at: Utc::now(),
            fired: false,
        })
    }

    /// True when the alert is unfired and the crossing condition holds.
    pub fn is_met(&self, current_price: f64) -> bool {
        if self.fired {
            return false;
        }
        match self.direction {
            AlertDirection::Above => current_price > self.threshold,
            AlertDirection::Below => current_price < self.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_above_fires_on_crossing() {
        let alert = Alert::new("BTC-USDT", 70000.0, AlertDirection::Above).unwrap();
        assert!(!alert.is_met(70000.0));
        assert!(alert.is_met(70001.0));
    }

    #[test]
    fn test_alert_below_fires_on_crossing() {
        let alert = Alert::new("BTC-USDT", 60000.0, AlertDirection::Below).unwrap();
        assert!(!alert.is_met(60000.0));
        assert!(alert.is_met(59999.0));
    }

    #[test]
    fn test_fired_alert_never_met() {
        let mut alert = Alert::new("BTC-USDT", 70000.0, AlertDirection::Above).unwrap();
        alert.fired = true;
        assert!(!alert.is_met(80000.0));
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("above".parse::<AlertDirection>().unwrap(), AlertDirection::Above);
        assert_eq!("BELOW".parse::<AlertDirection>().unwrap(), AlertDirection::Below);
        assert!("sideways".parse::<AlertDirection>().is_err());
    }

    #[test]
    fn test_alert_rejects_non_positive_threshold() {
        assert!(Alert::new("BTC-USDT", 0.0, AlertDirection::Above).is_err());
    }
}
