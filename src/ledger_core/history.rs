//! Persisted ledger history reader
//!
//! Loads all prior trade records at run start so the builder can skip
//! already-known trade ids and the aggregator can replay the full
//! ledger for cost-basis continuity.

use super::trade::{TradeRecord, TradeSource};
use crate::config::BackendType;
use crate::snapshot_core::TimeWindow;
use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug)]
pub enum HistoryError {
    Io(std::io::Error),
    Database(String),
}

impl From<std::io::Error> for HistoryError {
    fn from(err: std::io::Error) -> Self {
        HistoryError::Io(err)
    }
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::Io(e) => write!(f, "History IO error: {}", e),
            HistoryError::Database(e) => write!(f, "History database error: {}", e),
        }
    }
}

impl std::error::Error for HistoryError {}

pub struct LedgerHistory {
    pub records: Vec<TradeRecord>,
    pub known_ids: BTreeSet<String>,
}

impl LedgerHistory {
    /// Load prior records from the configured backend. A missing
    /// history location just means a first run.
    pub fn load(backend: BackendType, path: &Path) -> Result<Self, HistoryError> {
        let mut records = match backend {
            BackendType::Jsonl => load_jsonl_dir(path)?,
            BackendType::Sqlite => load_sqlite(path)?,
        };

        records.sort_by(|a, b| {
            (a.window.lower, &a.item_id, &a.trade_id).cmp(&(b.window.lower, &b.item_id, &b.trade_id))
        });
        let known_ids = records.iter().map(|r| r.trade_id.clone()).collect();

        log::info!("📥 Loaded {} prior trade record(s) from history", records.len());
        Ok(Self { records, known_ids })
    }

    pub fn is_known(&self, trade_id: &str) -> bool {
        self.known_ids.contains(trade_id)
    }
}

fn load_jsonl_dir(dir: &Path) -> Result<Vec<TradeRecord>, HistoryError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
        .collect();
    paths.sort();

    let mut records = Vec::new();
    for path in paths {
        let reader = BufReader::new(fs::File::open(&path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TradeRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::warn!("⚠️ Skipping malformed ledger line in {}: {}", path.display(), e);
                }
            }
        }
    }
    Ok(records)
}

fn load_sqlite(db_path: &Path) -> Result<Vec<TradeRecord>, HistoryError> {
    if !db_path.exists() {
        return Ok(Vec::new());
    }

    let conn = Connection::open(db_path).map_err(|e| HistoryError::Database(e.to_string()))?;
    conn.execute("PRAGMA query_only = ON", [])
        .map_err(|e| HistoryError::Database(e.to_string()))?;

    let mut stmt = conn
        .prepare(
            "SELECT trade_id, window_lower, window_upper, item_id, quantity, unit_price,
                    buyer_id, seller_id, source, low_confidence, multi_buyer_uncertain, unattributed
             FROM trades ORDER BY window_lower, item_id, trade_id",
        )
        .map_err(|e| HistoryError::Database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            let lower: i64 = row.get(1)?;
            let upper: i64 = row.get(2)?;
            let source: String = row.get(8)?;
            Ok(TradeRecord {
                trade_id: row.get(0)?,
                window: TimeWindow::new(
                    Utc.timestamp_opt(lower, 0).single().unwrap_or_default(),
                    Utc.timestamp_opt(upper, 0).single().unwrap_or_default(),
                ),
                item_id: row.get(3)?,
                quantity: row.get(4)?,
                unit_price: row.get(5)?,
                buyer_id: row.get(6)?,
                seller_id: row.get(7)?,
                source: parse_source(&source),
                low_confidence: row.get::<_, i64>(9)? != 0,
                multi_buyer_uncertain: row.get::<_, i64>(10)? != 0,
                unattributed: row.get::<_, i64>(11)? != 0,
                assumed_zero_cost_basis: false,
            })
        })
        .map_err(|e| HistoryError::Database(e.to_string()))?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.map_err(|e| HistoryError::Database(e.to_string()))?);
    }
    Ok(records)
}

fn parse_source(label: &str) -> TradeSource {
    match label {
        "marketplace-confirmed" => TradeSource::MarketplaceConfirmed,
        "both" => TradeSource::Both,
        _ => TradeSource::InventoryInferred,
    }
}
