use crate::domain::services::trailing_stop::TrailingStop;
use crate::persistence::{load_json, save_json, StoreError};
use std::collections::HashMap;
use std::path::PathBuf;

/// Trailing stop state keyed by symbol, persisted across restarts so a
/// ratcheted stop is never lost to a process crash.
pub struct TrailingStore {
    path: PathBuf,
    stops: HashMap<String, TrailingStop>,
}

impl TrailingStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let stops = load_json(&path)?;
        Ok(TrailingStore { path, stops })
    }

    pub fn get(&self, symbol: &str) -> Option<&TrailingStop> {
        self.stops.get(symbol)
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut TrailingStop> {
        self.stops.get_mut(symbol)
    }

    pub fn put(&mut self, stop: TrailingStop) -> Result<(), StoreError> {
        self.stops.insert(stop.symbol.clone(), stop);
        self.save()
    }

    pub fn remove(&mut self, symbol: &str) -> Result<Option<TrailingStop>, StoreError> {
        let removed = self.stops.remove(symbol);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn save(&self) -> Result<(), StoreError> {
        save_json(&self.path, &self.stops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::position::PositionSide;
    use crate::domain::services::trailing_stop::TrailingSignal;

    #[test]
    fn test_ratcheted_stop_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trailing.json");
        {
            let mut store = TrailingStore::open(&path).unwrap();
            let mut stop =
                TrailingStop::arm("BTC-USDT", PositionSide::Long, 100.0, 0.01).unwrap();
            stop.on_price(110.0).unwrap();
            store.put(stop).unwrap();
        }
        let mut store = TrailingStore::open(&path).unwrap();
        let stop = store.get_mut("BTC-USDT").unwrap();
        assert!((stop.stop_price - 108.9).abs() < 1e-9);
        // breach still triggers after the reload
        assert!(matches!(
            stop.on_price(108.0).unwrap(),
            TrailingSignal::Exit { .. }
        ));
    }

    #[test]
    fn test_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trailing.json");
        {
            let mut store = TrailingStore::open(&path).unwrap();
            let stop = TrailingStop::arm("BTC-USDT", PositionSide::Long, 100.0, 0.01).unwrap();
            store.put(stop).unwrap();
            store.remove("BTC-USDT").unwrap();
        }
        let store = TrailingStore::open(&path).unwrap();
        assert!(store.get("BTC-USDT").is_none());
    }
}
