//! Unified writer interface for the trade ledger
//!
//! Routes writes to either JSONL or SQLite backend based on configuration.

use super::jsonl_writer::JsonlLedgerWriter;
use super::sqlite_writer::SqliteLedgerWriter;
use super::trade::TradeRecord;
use super::writer_backend::{LedgerWriterBackend, LedgerWriterError};
use crate::config::BackendType;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Unified writer that routes to either JSONL or SQLite backend
pub enum LedgerWriter {
    Jsonl(JsonlLedgerWriter),
    Sqlite(SqliteLedgerWriter),
}

impl LedgerWriter {
    /// Create a new ledger writer based on backend type. For JSONL the
    /// path is the history directory; for SQLite it is the database file.
    pub fn new(
        backend: BackendType,
        history_path: PathBuf,
        cycle_ts: DateTime<Utc>,
    ) -> Result<Self, LedgerWriterError> {
        match backend {
            BackendType::Jsonl => {
                let writer = JsonlLedgerWriter::new(history_path, cycle_ts)?;
                Ok(LedgerWriter::Jsonl(writer))
            }
            BackendType::Sqlite => {
                let writer = SqliteLedgerWriter::new(history_path)?;
                Ok(LedgerWriter::Sqlite(writer))
            }
        }
    }

    /// Stage a trade record for the configured backend
    pub async fn write_record(&mut self, record: &TradeRecord) -> Result<(), LedgerWriterError> {
        match self {
            LedgerWriter::Jsonl(w) => w.write_record(record).await,
            LedgerWriter::Sqlite(w) => w.write_record(record).await,
        }
    }

    /// Commit staged records to durable storage
    pub async fn flush(&mut self) -> Result<(), LedgerWriterError> {
        match self {
            LedgerWriter::Jsonl(w) => LedgerWriterBackend::flush(w).await,
            LedgerWriter::Sqlite(w) => LedgerWriterBackend::flush(w).await,
        }
    }

    /// Get backend type for logging
    pub fn backend_type(&self) -> &'static str {
        match self {
            LedgerWriter::Jsonl(_) => "JSONL",
            LedgerWriter::Sqlite(_) => "SQLite",
        }
    }
}
