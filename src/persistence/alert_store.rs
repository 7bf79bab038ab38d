use crate::domain::entities::alert::Alert;
use crate::persistence::{load_json, save_json, StoreError};
use std::path::{Path, PathBuf};
use tracing::info;

/// Persisted collection of price alerts. Every mutation is written back
/// before control returns, so a fired alert survives a crash immediately
/// after the evaluation that fired it.
pub struct AlertStore {
    path: PathBuf,
    alerts: Vec<Alert>,
}

impl AlertStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let alerts = load_json(&path)?;
        Ok(AlertStore { path, alerts })
    }

    pub fn add(&mut self, alert: Alert) -> Result<(), StoreError> {
        info!(symbol = %alert.symbol, threshold = alert.threshold, direction = %alert.direction, "alert added");
        self.alerts.push(alert);
        self.save()
    }

    pub fn all(&self) -> &[Alert] {
        &self.alerts
    }

    /// Marks every unfired alert whose condition holds at `price` as fired,
    /// persists, then returns clones of the alerts that just fired. The
    /// save happens before returning so a crash cannot re-fire them.
    pub fn evaluate(&mut self, symbol: &str, price: f64) -> Result<Vec<Alert>, StoreError> {
        let mut fired = Vec::new();
        for alert in self.alerts.iter_mut().filter(|a| a.symbol == symbol) {
            if alert.is_met(price) {
                alert.fired = true;
                fired.push(alert.clone());
            }
        }
        if !fired.is_empty() {
            self.save()?;
            for alert in &fired {
                info!(symbol = %alert.symbol, threshold = alert.threshold, price, "alert fired");
            }
        }
        Ok(fired)
    }

    /// Re-arms every fired alert for the symbol.
    pub fn reset(&mut self, symbol: &str) -> Result<usize, StoreError> {
        let mut count = 0;
        for alert in self.alerts.iter_mut().filter(|a| a.symbol == symbol) {
            if alert.fired {
                alert.fired = false;
                count += 1;
            }
        }
        if count > 0 {
            self.save()?;
        }
        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        save_json(&self.path, &self.alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::alert::AlertDirection;

    fn store(dir: &tempfile::TempDir) -> AlertStore {
        AlertStore::open(dir.path().join("alerts.json")).unwrap()
    }

    #[test]
    fn test_alert_fires_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut alerts = store(&dir);
        alerts
            .add(Alert::new("BTC-USDT", 70000.0, AlertDirection::Above).unwrap())
            .unwrap();

        let fired = alerts.evaluate("BTC-USDT", 71000.0).unwrap();
        assert_eq!(fired.len(), 1);

        // qualifying price again, but the alert already fired
        let again = alerts.evaluate("BTC-USDT", 72000.0).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_fired_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut alerts = store(&dir);
            alerts
                .add(Alert::new("BTC-USDT", 70000.0, AlertDirection::Above).unwrap())
                .unwrap();
            alerts.evaluate("BTC-USDT", 71000.0).unwrap();
        }
        let mut reopened = store(&dir);
        assert!(reopened.evaluate("BTC-USDT", 72000.0).unwrap().is_empty());
    }

    #[test]
    fn test_reset_rearms() {
        let dir = tempfile::tempdir().unwrap();
        let mut alerts = store(&dir);
        alerts
            .add(Alert::new("BTC-USDT", 70000.0, AlertDirection::Above).unwrap())
            .unwrap();
        alerts.evaluate("BTC-USDT", 71000.0).unwrap();

        assert_eq!(alerts.reset("BTC-USDT").unwrap(), 1);
        assert_eq!(alerts.evaluate("BTC-USDT", 71000.0).unwrap().len(), 1);
    }

    #[test]
    fn test_other_symbols_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut alerts = store(&dir);
        alerts
            .add(Alert::new("ETH-USDT", 2000.0, AlertDirection::Below).unwrap())
            .unwrap();
        assert!(alerts.evaluate("BTC-USDT", 1000.0).unwrap().is_empty());
    }
}
