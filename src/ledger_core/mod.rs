//! Ledger Core - Trade Canonicalization and Analytics
//!
//! Merges the two evidence streams into one deduplicated trade ledger,
//! replays it for profit analytics, and publishes the results:
//!
//! ```text
//! InventoryEvents ─┐
//!                  ├─> LedgerBuilder ──> TradeRecord ledger
//! MarketTransactions ┘        │
//!                             ├─> ProfitAggregator ──> DashboardEmitter
//!                             └─> LedgerWriter → JSONL or SQLite backend
//! ```

pub mod builder;
pub mod emitter;
pub mod history;
pub mod jsonl_writer;
pub mod profit;
pub mod sqlite_writer;
pub mod trade;
pub mod writer;
pub mod writer_backend;

pub use builder::LedgerBuilder;
pub use emitter::{DashboardData, DashboardEmitter};
pub use history::{HistoryError, LedgerHistory};
pub use jsonl_writer::JsonlLedgerWriter;
pub use profit::{AggregationResult, ItemStats, PlayerProfile, PriceRange, ProfitAggregator};
pub use sqlite_writer::SqliteLedgerWriter;
pub use trade::{derive_trade_id, prices_match, TradeRecord, TradeSource};
pub use writer::LedgerWriter;
pub use writer_backend::{LedgerWriterBackend, LedgerWriterError};
