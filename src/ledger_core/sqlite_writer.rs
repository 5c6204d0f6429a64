//! SQLite writer for the trade ledger
//!
//! Batched inserts with `INSERT OR IGNORE` on the unique `trade_id`, so
//! re-running the pipeline over the same snapshots never duplicates a
//! row regardless of what the builder re-emits.

use super::trade::{TradeRecord, TradeSource};
use super::writer_backend::{LedgerWriterBackend, LedgerWriterError};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;

const BATCH_SIZE: usize = 100;

pub struct SqliteLedgerWriter {
    conn: Connection,
    batch: Vec<TradeRecord>,
}

pub(crate) fn source_label(source: TradeSource) -> &'static str {
    match source {
        TradeSource::InventoryInferred => "inventory-inferred",
        TradeSource::MarketplaceConfirmed => "marketplace-confirmed",
        TradeSource::Both => "both",
    }
}

impl SqliteLedgerWriter {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, LedgerWriterError> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerWriterError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to create database directory {}: {}", parent.display(), e),
                ))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| LedgerWriterError::Database(e.to_string()))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| LedgerWriterError::Database(e.to_string()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| LedgerWriterError::Database(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trade_id TEXT UNIQUE NOT NULL,
                window_lower INTEGER NOT NULL,
                window_upper INTEGER NOT NULL,
                item_id TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                unit_price REAL NOT NULL,
                buyer_id TEXT,
                seller_id TEXT,
                source TEXT NOT NULL,
                low_confidence INTEGER NOT NULL,
                multi_buyer_uncertain INTEGER NOT NULL,
                unattributed INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| LedgerWriterError::Database(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_item_window ON trades(item_id, window_lower)",
            [],
        )
        .map_err(|e| LedgerWriterError::Database(e.to_string()))?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_window_lower ON trades(window_lower)",
            [],
        )
        .map_err(|e| LedgerWriterError::Database(e.to_string()))?;

        log::info!("✅ SQLite ledger initialized with WAL mode");

        Ok(Self {
            conn,
            batch: Vec::with_capacity(BATCH_SIZE),
        })
    }

    fn flush_batch(&mut self) -> Result<(), LedgerWriterError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| LedgerWriterError::Database(e.to_string()))?;

        for record in &self.batch {
            tx.execute(
                "INSERT OR IGNORE INTO trades
                 (trade_id, window_lower, window_upper, item_id, quantity, unit_price,
                  buyer_id, seller_id, source, low_confidence, multi_buyer_uncertain, unattributed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.trade_id,
                    record.window.lower.timestamp(),
                    record.window.upper.timestamp(),
                    record.item_id,
                    record.quantity,
                    record.unit_price,
                    record.buyer_id,
                    record.seller_id,
                    source_label(record.source),
                    record.low_confidence as i64,
                    record.multi_buyer_uncertain as i64,
                    record.unattributed as i64,
                ],
            )
            .map_err(|e| LedgerWriterError::Database(e.to_string()))?;
        }

        tx.commit()
            .map_err(|e| LedgerWriterError::Database(e.to_string()))?;

        log::debug!("✅ Flushed {} trade(s) to SQLite", self.batch.len());
        self.batch.clear();

        Ok(())
    }
}

#[async_trait]
impl LedgerWriterBackend for SqliteLedgerWriter {
    async fn write_record(&mut self, record: &TradeRecord) -> Result<(), LedgerWriterError> {
        self.batch.push(record.clone());
        if self.batch.len() >= BATCH_SIZE {
            self.flush_batch()?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), LedgerWriterError> {
        self.flush_batch()
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger_core::trade::derive_trade_id;
    use crate::snapshot_core::TimeWindow;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn record(item: &str, qty: i64, hour: u32) -> TradeRecord {
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 1, hour + 1, 0, 0).unwrap(),
        );
        TradeRecord {
            trade_id: derive_trade_id(item, qty, 3.0, Some("F1"), Some("F2"), window.lower),
            window,
            item_id: item.to_string(),
            quantity: qty,
            unit_price: 3.0,
            buyer_id: Some("F2".to_string()),
            seller_id: Some("F1".to_string()),
            source: TradeSource::Both,
            low_confidence: false,
            multi_buyer_uncertain: false,
            unattributed: false,
            assumed_zero_cost_basis: false,
        }
    }

    #[tokio::test]
    async fn test_basic_write() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");
        let mut writer = SqliteLedgerWriter::new(&db_path).unwrap();

        writer.write_record(&record("wheat", 20, 1)).await.unwrap();
        writer.flush().await.unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_rerun_does_not_duplicate() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");

        // Two runs over the same trade id
        for _ in 0..2 {
            let mut writer = SqliteLedgerWriter::new(&db_path).unwrap();
            writer.write_record(&record("wheat", 20, 1)).await.unwrap();
            writer.flush().await.unwrap();
        }

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_wal_mode_enabled() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");
        let _writer = SqliteLedgerWriter::new(&db_path).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_batch_auto_flush() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");
        let mut writer = SqliteLedgerWriter::new(&db_path).unwrap();

        for i in 0..150 {
            writer.write_record(&record("wheat", i, 1)).await.unwrap();
        }
        writer.flush().await.unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 150);
    }
}
