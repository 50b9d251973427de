//! Shared state document exchanged with the ingester and the presenter
//!
//! The document is a single JSON file. The ingester owns `last_trades`; this
//! crate owns `stats`, `alerts` and `last_update`. There is no locking:
//! readers may see a stale document, and a torn read is treated like a
//! missing one.

use super::{RollingStats, Trade};
use crate::error::Result;
use crate::fusion::AlertEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The whole shared document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub last_trades: Vec<Trade>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub alerts: Vec<AlertEntry>,
    #[serde(
        default,
        deserialize_with = "lenient_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub stats: Option<RollingStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<i64>,
    /// Fields written by other processes, preserved as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SharedState {
    /// Price history in ingestion order
    pub fn prices(&self) -> Vec<f64> {
        super::prices(&self.last_trades)
    }

    /// Overwrite the fields owned by the analysis engine
    pub fn apply(&mut self, update: &StateUpdate) {
        self.stats = Some(update.stats);
        self.alerts = update.alerts.clone();
        self.last_update = Some(update.last_update);
    }
}

/// Keep the elements that parse; a bad entry (e.g. a `null` where a number
/// belongs) is dropped instead of failing the whole document
fn lenient_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).ok())
}

/// Fields produced by one analysis cycle
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub stats: RollingStats,
    pub alerts: Vec<AlertEntry>,
    pub last_update: i64,
}

/// File-backed access to the shared document
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document; `Ok(None)` when it does not exist yet
    pub fn try_load(&self) -> Result<Option<SharedState>> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&content)?))
    }

    /// Read the document, degrading every failure to the empty state
    pub fn load(&self) -> SharedState {
        match self.try_load() {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(path = %self.path.display(), "state document missing, starting empty");
                SharedState::default()
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "unreadable state document, treating as empty"
                );
                SharedState::default()
            }
        }
    }

    /// Write engine-owned fields on top of the latest document on disk.
    ///
    /// Re-reading right before the write keeps trades the ingester appended
    /// during the cycle. If that read fails, `snapshot` is used as the base.
    pub fn publish(&self, snapshot: &SharedState, update: &StateUpdate) -> Result<()> {
        let mut base = match self.try_load() {
            Ok(Some(latest)) => latest,
            Ok(None) | Err(_) => snapshot.clone(),
        };
        base.apply(update);
        self.save(&base)
    }

    /// Replace the document atomically: write a sibling temp file, then rename
    pub fn save(&self, state: &SharedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        fs::write(&tmp, serde_json::to_vec(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("state.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::SamplePoint;
    use tempfile::tempdir;

    fn update(ts: i64) -> StateUpdate {
        StateUpdate {
            stats: RollingStats {
                mu: 100.0,
                sigma: 1.0,
                zscore: 0.0,
            },
            alerts: vec![AlertEntry::Sample(SamplePoint {
                ts,
                price: 100.0,
                anomaly: false,
            })],
            last_update: ts,
        }
    }

    #[test]
    fn test_missing_document_is_empty_state() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        assert!(store.try_load().unwrap().is_none());
        assert_eq!(store.load(), SharedState::default());
    }

    #[test]
    fn test_malformed_document_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{\"last_trades\": [ {\"price\": 1.0").unwrap();

        let store = StateStore::new(&path);
        assert!(store.try_load().is_err());
        assert_eq!(store.load(), SharedState::default());
    }

    #[test]
    fn test_ingester_document_is_readable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"last_trades": [{"price": 100.5, "qty": 0.1, "ts": 1, "isBuyerMaker": false}],
                "timestamp": 1700000000000}"#,
        )
        .unwrap();

        let state = StateStore::new(&path).load();
        assert_eq!(state.prices(), vec![100.5]);
        assert!(state.alerts.is_empty());
        assert_eq!(state.extra.get("timestamp"), Some(&Value::from(1_700_000_000_000_i64)));
    }

    #[test]
    fn test_publish_preserves_foreign_fields_and_new_trades() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("state.json"));

        let mut snapshot = SharedState::default();
        snapshot.last_trades.push(Trade::new(100.0, 1.0, 1, false));
        snapshot.extra.insert("timestamp".into(), Value::from(5));
        store.save(&snapshot).unwrap();

        // ingester appends while the cycle runs
        let mut latest = snapshot.clone();
        latest.last_trades.push(Trade::new(101.0, 1.0, 2, true));
        store.save(&latest).unwrap();

        store.publish(&snapshot, &update(42)).unwrap();

        let written = store.load();
        assert_eq!(written.last_trades.len(), 2);
        assert_eq!(written.last_update, Some(42));
        assert_eq!(written.alerts.len(), 1);
        assert_eq!(written.extra.get("timestamp"), Some(&Value::from(5)));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_publish_falls_back_to_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"not json").unwrap();

        let mut snapshot = SharedState::default();
        snapshot.last_trades.push(Trade::new(100.0, 1.0, 1, false));

        let store = StateStore::new(&path);
        store.publish(&snapshot, &update(7)).unwrap();

        let written = store.load();
        assert_eq!(written.last_trades, snapshot.last_trades);
        assert_eq!(written.stats.map(|s| s.mu), Some(100.0));
    }

    #[test]
    fn test_null_numbers_drop_only_the_bad_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"last_trades": [{"price": null}, {"price": 100.0}],
                "stats": {"mu": null, "sigma": 1.0, "zscore": null},
                "alerts": [{"ts": 1, "price": null, "anomaly": false},
                           {"ts": 2, "price": 100.0, "anomaly": false}],
                "last_update": 2}"#,
        )
        .unwrap();

        let state = StateStore::new(&path).try_load().unwrap().unwrap();
        assert_eq!(state.prices(), vec![100.0]);
        assert!(state.stats.is_none());
        assert_eq!(state.alerts.len(), 1);
        assert_eq!(state.alerts[0].ts(), 2);
        assert_eq!(state.last_update, Some(2));
    }
}
