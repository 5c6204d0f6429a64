//! Dashboard document emission
//!
//! Assembles the summary document the web dashboard polls and writes it
//! through a temp file rename so a crashed run never leaves a partial
//! document behind.

use super::profit::{AggregationResult, ItemStats, PlayerProfile};
use super::trade::TradeRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub generated_at: DateTime<Utc>,
    pub top_traders: Vec<PlayerProfile>,
    pub item_stats: Vec<ItemStats>,
    pub recent_activity: Vec<TradeRecord>,
    pub unresolved_count: usize,
}

pub struct DashboardEmitter {
    top_traders_limit: usize,
    recent_activity_limit: usize,
}

impl DashboardEmitter {
    pub fn new(top_traders_limit: usize, recent_activity_limit: usize) -> Self {
        Self {
            top_traders_limit,
            recent_activity_limit,
        }
    }

    /// Rank profiles and items and take the most recent ledger slice.
    /// Ordering is total: every tie breaks on the id, so equal inputs
    /// produce an identical document.
    pub fn assemble(
        &self,
        result: &AggregationResult,
        records: &[TradeRecord],
        generated_at: DateTime<Utc>,
    ) -> DashboardData {
        let mut top_traders: Vec<PlayerProfile> = result.profiles.values().cloned().collect();
        top_traders.sort_by(|a, b| {
            b.realized_profit
                .partial_cmp(&a.realized_profit)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        top_traders.truncate(self.top_traders_limit);

        let mut item_stats: Vec<ItemStats> = result.item_stats.values().cloned().collect();
        item_stats.sort_by(|a, b| {
            b.total_volume
                .cmp(&a.total_volume)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });

        // Ledger order is chronological, take from the tail
        let skip = records.len().saturating_sub(self.recent_activity_limit);
        let mut recent_activity: Vec<TradeRecord> = records[skip..].to_vec();
        recent_activity.reverse();

        DashboardData {
            generated_at,
            top_traders,
            item_stats,
            recent_activity,
            unresolved_count: result.unresolved_count,
        }
    }

    /// Atomic write: serialize to `<path>.tmp`, then rename over the
    /// target.
    pub fn write(&self, data: &DashboardData, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        log::info!("📊 Dashboard written to {}", path.display());
        Ok(())
    }
}
