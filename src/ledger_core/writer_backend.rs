//! Writer backend trait for the persisted trade ledger
//!
//! Defines the interface for appending canonical trade records to
//! different storage backends.

use super::trade::TradeRecord;
use async_trait::async_trait;

#[derive(Debug)]
pub enum LedgerWriterError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
}

impl From<std::io::Error> for LedgerWriterError {
    fn from(err: std::io::Error) -> Self {
        LedgerWriterError::Io(err)
    }
}

impl From<serde_json::Error> for LedgerWriterError {
    fn from(err: serde_json::Error) -> Self {
        LedgerWriterError::Serialization(err)
    }
}

impl std::fmt::Display for LedgerWriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerWriterError::Io(e) => write!(f, "IO error: {}", e),
            LedgerWriterError::Serialization(e) => write!(f, "Serialization error: {}", e),
            LedgerWriterError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for LedgerWriterError {}

/// Backend trait for appending trade records
#[async_trait]
pub trait LedgerWriterBackend: Send {
    /// Stage a single trade record for persistence
    async fn write_record(&mut self, record: &TradeRecord) -> Result<(), LedgerWriterError>;

    /// Commit staged records to durable storage
    async fn flush(&mut self) -> Result<(), LedgerWriterError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
