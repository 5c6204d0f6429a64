//! Snapshot Core - Trade Evidence Extraction
//!
//! Turns raw collector pulls into trade evidence for the ledger builder:
//!
//! ```text
//! Snapshot Store ─┬─> State Differencer ──> InventoryEvent candidates
//!                 └─> Marketplace Reconciler ──> MarketTransaction fills
//! ```

pub mod differ;
pub mod reconciler;
pub mod store;
pub mod types;

pub use differ::{diff_farm_snapshots, DiffConfig, EventDirection, InventoryEvent, MismatchedFarmError};
pub use reconciler::{
    reconcile_marketplace, CycleReconciliation, ListingChange, MarketTransaction,
    OutOfOrderSnapshotError,
};
pub use store::{load_farm_list, SnapshotError, SnapshotStore};
pub use types::{FarmSnapshot, Listing, ListingStatus, MarketplaceSnapshot, TimeWindow};
