pub mod alert_store;
pub mod journal;
pub mod trailing_store;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Store failures. `Corrupted` is fatal: proceeding with default state
/// could silently bypass risk limits.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store corrupted at {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Loads a JSON store. A missing file is a fresh start and yields the
/// default; a present but unreadable file is corruption and fatal.
pub fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_str(&raw).map_err(|e| StoreError::Corrupted {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Atomically replaces the store: write a sibling temp file, then rename
/// over the target so readers never observe a partial write.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
    }
    let raw = serde_json::to_string_pretty(value).map_err(|e| StoreError::Corrupted {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, raw).map_err(|e| StoreError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let value: HashMap<String, f64> = load_json(&path).unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut value = HashMap::new();
        value.insert("BTC-USDT".to_string(), 66000.0);
        save_json(&path, &value).unwrap();
        let loaded: HashMap<String, f64> = load_json(&path).unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_malformed_file_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json {").unwrap();
        let result: Result<HashMap<String, f64>, _> = load_json(&path);
        assert!(matches!(result, Err(StoreError::Corrupted { .. })));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/store.json");
        save_json(&path, &vec![1.0, 2.0]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        save_json(&path, &vec![1.0]).unwrap();
        assert!(!path.with_extension("tmp").exists());
    }
}
