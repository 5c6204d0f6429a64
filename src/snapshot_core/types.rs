//! Snapshot data model shared by the differencer and the reconciler
//!
//! Snapshots are immutable once loaded. Field names follow the collector
//! JSON contract (camelCase, ISO-8601 timestamps).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time capture of one farm's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmSnapshot {
    pub farm_id: String,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub inventory: BTreeMap<String, i64>,
    #[serde(default)]
    pub balances: BTreeMap<String, f64>,
}

impl FarmSnapshot {
    pub fn quantity(&self, item_id: &str) -> i64 {
        self.inventory.get(item_id).copied().unwrap_or(0)
    }

    pub fn balance(&self, currency_id: &str) -> f64 {
        self.balances.get(currency_id).copied().unwrap_or(0.0)
    }
}

/// Point-in-time capture of the marketplace listing set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceSnapshot {
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub listings: Vec<Listing>,
}

/// An open offer to sell a quantity of an item at a unit price.
///
/// `quantity` is the remaining (unfilled) quantity at capture time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub listing_id: String,
    pub seller_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub status: ListingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingStatus {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "filled")]
    Filled,
    #[serde(rename = "cancelled")]
    Cancelled,
}

/// Inclusive timestamp window bounded by the two snapshots that produced
/// an inferred event. Never narrower than the actual sampling gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub lower: DateTime<Utc>,
    pub upper: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(lower: DateTime<Utc>, upper: DateTime<Utc>) -> Self {
        Self { lower, upper }
    }

    /// Interior overlap: windows that merely share a boundary instant
    /// (adjacent collection cycles) do not overlap. Identical windows do.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.lower < other.upper && other.lower < self.upper
    }

    pub fn gap_secs(&self) -> i64 {
        (self.upper - self.lower).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_farm_snapshot() {
        let doc = r#"{
            "farmId": "F1",
            "capturedAt": "2025-06-01T12:00:00Z",
            "inventory": {"wheat": 100, "Stone": 40},
            "balances": {"SFL": 250.5}
        }"#;

        let snap: FarmSnapshot = serde_json::from_str(doc).unwrap();
        assert_eq!(snap.farm_id, "F1");
        assert_eq!(snap.quantity("wheat"), 100);
        assert_eq!(snap.quantity("missing"), 0);
        assert_eq!(snap.balance("SFL"), 250.5);
    }

    #[test]
    fn test_parse_marketplace_snapshot() {
        let doc = r#"{
            "capturedAt": "2025-06-01T12:00:00Z",
            "listings": [
                {"listingId": "L1", "sellerId": "F1", "itemId": "wheat",
                 "quantity": 20, "unitPrice": 3.0, "status": "open"}
            ]
        }"#;

        let snap: MarketplaceSnapshot = serde_json::from_str(doc).unwrap();
        assert_eq!(snap.listings.len(), 1);
        assert_eq!(snap.listings[0].status, ListingStatus::Open);
        assert_eq!(snap.listings[0].unit_price, 3.0);
    }

    #[test]
    fn test_missing_required_field_is_error() {
        let doc = r#"{"capturedAt": "2025-06-01T12:00:00Z"}"#;
        assert!(serde_json::from_str::<FarmSnapshot>(doc).is_err());
    }

    #[test]
    fn test_window_overlap() {
        let ts = |h: u32| Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap();
        let a = TimeWindow::new(ts(1), ts(3));
        let b = TimeWindow::new(ts(2), ts(5));
        let adjacent = TimeWindow::new(ts(3), ts(5));
        let c = TimeWindow::new(ts(6), ts(7));

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(a.overlaps(&a));
        // Adjacent cycles share only a boundary instant
        assert!(!a.overlaps(&adjacent));
        assert!(!a.overlaps(&c));
        assert_eq!(a.gap_secs(), 7200);
    }
}
