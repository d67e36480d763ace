//! Position Store
//!
//! Durable collection of open and closed positions, keyed by position id.
//! The whole store serializes to one JSON file written temp-then-rename on
//! every mutation, so a crash mid-tick never leaves a corrupt file behind.
//! On restart only Active positions re-enter evaluation; records that fail
//! their entry invariants are quarantined as Corrupt instead of aborting
//! startup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::position::{Position, PositionStatus};
use crate::clock::unix_ms;

/// Default store file name inside the data directory
pub const DEFAULT_STORE_FILE: &str = "positions.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read store file: {0}")]
    ReadError(String),

    #[error("failed to write store file: {0}")]
    WriteError(String),

    #[error("store file is corrupted: {0}")]
    CorruptedFile(String),

    #[error("failed to create data directory: {0}")]
    DirectoryError(String),

    #[error("unknown position: {0}")]
    UnknownPosition(String),

    #[error("duplicate position id: {0}")]
    DuplicateId(String),
}

/// Single-writer store; all mutation funnels through the risk engine
#[derive(Debug)]
pub struct PositionStore {
    path: PathBuf,
    positions: HashMap<String, Position>,
}

impl PositionStore {
    /// Open the store at `path`, loading existing records.
    ///
    /// Active records with broken entry invariants are frozen as Corrupt and
    /// logged for manual review rather than re-entering the trading loop.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut store = Self {
            path,
            positions: HashMap::new(),
        };

        if store.path.exists() {
            let content = fs::read_to_string(&store.path)
                .map_err(|e| StoreError::ReadError(e.to_string()))?;
            if !content.trim().is_empty() {
                let records: Vec<Position> = serde_json::from_str(&content)
                    .map_err(|e| StoreError::CorruptedFile(e.to_string()))?;

                let mut quarantined = 0usize;
                for mut position in records {
                    if position.is_active() {
                        if let Err(e) = position.validate() {
                            tracing::warn!(
                                id = %position.id,
                                symbol = %position.symbol,
                                error = %e,
                                "quarantining position with broken invariants"
                            );
                            let _ = position.mark_corrupt(unix_ms());
                            quarantined += 1;
                        }
                    }
                    store.positions.insert(position.id.clone(), position);
                }

                let active = store.active_ids().len();
                tracing::info!(
                    total = store.positions.len(),
                    active,
                    quarantined,
                    "position store loaded from {}",
                    store.path.display()
                );
                if quarantined > 0 {
                    store.save()?;
                }
            }
        }

        Ok(store)
    }

    /// Store file path under a data directory
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join(DEFAULT_STORE_FILE)
    }

    /// Insert a newly opened position and persist
    pub fn insert(&mut self, position: Position) -> Result<(), StoreError> {
        if self.positions.contains_key(&position.id) {
            return Err(StoreError::DuplicateId(position.id));
        }
        self.positions.insert(position.id.clone(), position);
        self.save()
    }

    /// Replace an existing record and persist
    pub fn update(&mut self, position: Position) -> Result<(), StoreError> {
        if !self.positions.contains_key(&position.id) {
            return Err(StoreError::UnknownPosition(position.id));
        }
        self.positions.insert(position.id.clone(), position);
        self.save()
    }

    pub fn get(&self, id: &str) -> Option<&Position> {
        self.positions.get(id)
    }

    /// Ids of Active positions, the engine's per-tick work list
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .positions
            .values()
            .filter(|p| p.is_active())
            .map(|p| p.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn all(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sum of realized quote-currency PnL across closed positions
    pub fn realized_pnl_quote(&self) -> f64 {
        self.positions
            .values()
            .filter(|p| p.status.is_terminal() && p.status != PositionStatus::Corrupt)
            .filter_map(|p| p.realized_pnl_quote())
            .sum()
    }

    /// Write the full record list atomically: temp file in the same
    /// directory, then rename over the target.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::DirectoryError(e.to_string()))?;
        }

        let mut records: Vec<&Position> = self.positions.values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        let content = serde_json::to_string_pretty(&records)
            .map_err(|e| StoreError::WriteError(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| StoreError::WriteError(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::WriteError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{ExitReason, Role};
    use tempfile::tempdir;

    fn position(id: &str) -> Position {
        Position::open(id, "MintAAA", "WIF", Role::Default, 1.0, 10.0, 10.0, 1_000).unwrap()
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let store = PositionStore::open(dir.path().join("positions.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("positions.json");

        let mut store = PositionStore::open(&path).unwrap();
        store.insert(position("p1")).unwrap();
        store.insert(position("p2")).unwrap();

        let reloaded = PositionStore::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.active_ids(), vec!["p1", "p2"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let dir = tempdir().unwrap();
        let mut store = PositionStore::open(dir.path().join("positions.json")).unwrap();
        store.insert(position("p1")).unwrap();
        assert!(matches!(
            store.insert(position("p1")),
            Err(StoreError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_update_unknown_rejected() {
        let dir = tempdir().unwrap();
        let mut store = PositionStore::open(dir.path().join("positions.json")).unwrap();
        assert!(matches!(
            store.update(position("ghost")),
            Err(StoreError::UnknownPosition(_))
        ));
    }

    #[test]
    fn test_closed_positions_not_in_active_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("positions.json");
        let mut store = PositionStore::open(&path).unwrap();

        let mut pos = position("p1");
        store.insert(pos.clone()).unwrap();
        pos.record_price(1.3, 0.08).unwrap();
        pos.close(ExitReason::TakeProfit, 1.3, 2_000).unwrap();
        store.update(pos).unwrap();
        store.insert(position("p2")).unwrap();

        let reloaded = PositionStore::open(&path).unwrap();
        assert_eq!(reloaded.active_ids(), vec!["p2"]);
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_realized_pnl_sums_closes() {
        let dir = tempdir().unwrap();
        let mut store = PositionStore::open(dir.path().join("positions.json")).unwrap();

        let mut win = position("p1");
        win.record_price(1.5, 0.08).unwrap();
        win.close(ExitReason::TakeProfit, 1.5, 2_000).unwrap();
        store.insert(win).unwrap();

        let mut loss = position("p2");
        loss.record_price(0.8, 0.08).unwrap();
        loss.close(ExitReason::StopLoss, 0.8, 2_000).unwrap();
        store.insert(loss).unwrap();

        // +5.0 and -2.0
        assert!((store.realized_pnl_quote() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_corrupt_records_quarantined_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("positions.json");

        // Hand-write a record with a broken entry amount
        let mut bad = position("p1");
        bad.entry_value_quote = 0.0;
        let good = position("p2");
        let content = serde_json::to_string(&vec![&bad, &good]).unwrap();
        fs::write(&path, content).unwrap();

        let store = PositionStore::open(&path).unwrap();
        assert_eq!(store.active_ids(), vec!["p2"]);
        assert_eq!(store.get("p1").unwrap().status, PositionStatus::Corrupt);

        // Quarantine was persisted
        let reloaded = PositionStore::open(&path).unwrap();
        assert_eq!(reloaded.get("p1").unwrap().status, PositionStatus::Corrupt);
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("positions.json");
        fs::write(&path, "{ not json }").unwrap();

        assert!(matches!(
            PositionStore::open(&path),
            Err(StoreError::CorruptedFile(_))
        ));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("positions.json");
        let mut store = PositionStore::open(&path).unwrap();
        store.insert(position("p1")).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_save_creates_data_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("positions.json");
        let mut store = PositionStore::open(&path).unwrap();
        store.insert(position("p1")).unwrap();
        assert!(path.exists());
    }
}
