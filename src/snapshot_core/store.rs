//! Snapshot store loading
//!
//! Reads every raw pull document up front so differencing and
//! reconciliation operate on fully-materialized in-memory data. Malformed
//! documents are excluded and counted rather than aborting the run.

use super::types::{FarmSnapshot, MarketplaceSnapshot};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error),
    Malformed { path: String, reason: String },
}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        SnapshotError::Io(err)
    }
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "IO error: {}", e),
            SnapshotError::Malformed { path, reason } => {
                write!(f, "Malformed snapshot {}: {}", path, reason)
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

/// In-memory view of one run's snapshot inputs.
pub struct SnapshotStore {
    farms: BTreeMap<String, Vec<FarmSnapshot>>,
    marketplace: Vec<MarketplaceSnapshot>,
    pub malformed_count: usize,
    pub skipped_farms: Vec<String>,
}

impl SnapshotStore {
    /// Load all farm and marketplace snapshot documents.
    ///
    /// Only farms named in `farm_ids` are considered; listed farms with
    /// no snapshots on disk are skipped with a warning, not a failure.
    pub fn load(
        farm_dir: &Path,
        market_dir: &Path,
        farm_ids: &[String],
    ) -> Result<Self, SnapshotError> {
        let mut malformed_count = 0;

        let mut farms: BTreeMap<String, Vec<FarmSnapshot>> = BTreeMap::new();
        for path in json_files(farm_dir)? {
            match read_json::<FarmSnapshot>(&path) {
                Ok(snap) => {
                    if farm_ids.contains(&snap.farm_id) {
                        farms.entry(snap.farm_id.clone()).or_default().push(snap);
                    }
                }
                Err(e) => {
                    log::warn!("Excluding malformed farm snapshot: {}", e);
                    malformed_count += 1;
                }
            }
        }
        for snaps in farms.values_mut() {
            snaps.sort_by_key(|s| s.captured_at);
        }

        let mut skipped_farms = Vec::new();
        for farm_id in farm_ids {
            if !farms.contains_key(farm_id) {
                log::warn!("No snapshots found for farm {}, skipping", farm_id);
                skipped_farms.push(farm_id.clone());
            }
        }

        let mut marketplace = Vec::new();
        for path in json_files(market_dir)? {
            match read_json::<MarketplaceSnapshot>(&path) {
                Ok(snap) => marketplace.push(snap),
                Err(e) => {
                    log::warn!("Excluding malformed marketplace snapshot: {}", e);
                    malformed_count += 1;
                }
            }
        }
        marketplace.sort_by_key(|s| s.captured_at);

        log::info!(
            "📥 Loaded {} farm snapshot(s) across {} farm(s), {} marketplace snapshot(s)",
            farms.values().map(Vec::len).sum::<usize>(),
            farms.len(),
            marketplace.len()
        );

        Ok(Self {
            farms,
            marketplace,
            malformed_count,
            skipped_farms,
        })
    }

    /// Per-farm snapshot series, chronologically sorted.
    pub fn farms(&self) -> &BTreeMap<String, Vec<FarmSnapshot>> {
        &self.farms
    }

    /// Marketplace snapshot series, chronologically sorted.
    pub fn marketplace(&self) -> &[MarketplaceSnapshot] {
        &self.marketplace
    }
}

/// Load the farm id list: one id per line, `#` comments and blank lines
/// ignored.
pub fn load_farm_list(path: &Path) -> Result<Vec<String>, SnapshotError> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn json_files(dir: &Path) -> Result<Vec<std::path::PathBuf>, SnapshotError> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    // Deterministic load order regardless of directory iteration order
    paths.sort();
    Ok(paths)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SnapshotError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| SnapshotError::Malformed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_load_groups_and_sorts_farm_snapshots() {
        let farm_dir = tempdir().unwrap();
        let market_dir = tempdir().unwrap();

        write(
            farm_dir.path(),
            "f1_late.json",
            r#"{"farmId":"F1","capturedAt":"2025-06-01T13:00:00Z","inventory":{},"balances":{}}"#,
        );
        write(
            farm_dir.path(),
            "f1_early.json",
            r#"{"farmId":"F1","capturedAt":"2025-06-01T12:00:00Z","inventory":{},"balances":{}}"#,
        );
        write(
            market_dir.path(),
            "m1.json",
            r#"{"capturedAt":"2025-06-01T12:00:00Z","listings":[]}"#,
        );

        let store = SnapshotStore::load(
            farm_dir.path(),
            market_dir.path(),
            &["F1".to_string(), "F9".to_string()],
        )
        .unwrap();

        let snaps = &store.farms()["F1"];
        assert_eq!(snaps.len(), 2);
        assert!(snaps[0].captured_at < snaps[1].captured_at);
        assert_eq!(store.skipped_farms, vec!["F9".to_string()]);
        assert_eq!(store.marketplace().len(), 1);
        assert_eq!(store.malformed_count, 0);
    }

    #[test]
    fn test_malformed_snapshot_excluded_not_fatal() {
        let farm_dir = tempdir().unwrap();
        let market_dir = tempdir().unwrap();

        write(farm_dir.path(), "bad.json", r#"{"capturedAt":"2025-06-01T12:00:00Z"}"#);
        write(
            farm_dir.path(),
            "good.json",
            r#"{"farmId":"F1","capturedAt":"2025-06-01T12:00:00Z","inventory":{},"balances":{}}"#,
        );

        let store =
            SnapshotStore::load(farm_dir.path(), market_dir.path(), &["F1".to_string()]).unwrap();

        assert_eq!(store.malformed_count, 1);
        assert_eq!(store.farms().len(), 1);
    }

    #[test]
    fn test_farms_not_in_list_ignored() {
        let farm_dir = tempdir().unwrap();
        let market_dir = tempdir().unwrap();

        write(
            farm_dir.path(),
            "f2.json",
            r#"{"farmId":"F2","capturedAt":"2025-06-01T12:00:00Z","inventory":{},"balances":{}}"#,
        );

        let store =
            SnapshotStore::load(farm_dir.path(), market_dir.path(), &["F1".to_string()]).unwrap();

        assert!(store.farms().is_empty());
        assert_eq!(store.skipped_farms, vec!["F1".to_string()]);
    }

    #[test]
    fn test_load_farm_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("farms.txt");
        fs::write(&path, "# tracked farms\nF1\n\n  F2  \n").unwrap();

        let farms = load_farm_list(&path).unwrap();
        assert_eq!(farms, vec!["F1".to_string(), "F2".to_string()]);
    }
}
