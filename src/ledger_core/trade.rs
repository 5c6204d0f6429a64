//! Canonical trade records
//!
//! A `TradeRecord` is the deduplicated representation of one completed
//! economic transfer. Its id is derived from the matching key, never
//! from insertion order, so re-running the builder over the same
//! snapshot inputs reproduces identical ids.

use crate::snapshot_core::TimeWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSource {
    #[serde(rename = "inventory-inferred")]
    InventoryInferred,
    #[serde(rename = "marketplace-confirmed")]
    MarketplaceConfirmed,
    #[serde(rename = "both")]
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub trade_id: String,
    #[serde(rename = "timestampWindow")]
    pub window: TimeWindow,
    pub item_id: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub buyer_id: Option<String>,
    pub seller_id: Option<String>,
    pub source: TradeSource,
    #[serde(default)]
    pub low_confidence: bool,
    #[serde(default)]
    pub multi_buyer_uncertain: bool,
    #[serde(default)]
    pub unattributed: bool,
    #[serde(default)]
    pub assumed_zero_cost_basis: bool,
}

impl TradeRecord {
    /// A record missing either counterparty contributes to item stats
    /// but never to a player profile.
    pub fn is_attributed(&self) -> bool {
        self.buyer_id.is_some() && self.seller_id.is_some()
    }

    /// The (buyer, seller, item, quantity, price, window) identity used
    /// for deduplication, with prices compared under a relative
    /// tolerance.
    pub fn same_transfer(&self, other: &TradeRecord, price_tolerance_pct: f64) -> bool {
        self.item_id == other.item_id
            && self.quantity == other.quantity
            && self.buyer_id == other.buyer_id
            && self.seller_id == other.seller_id
            && self.window.overlaps(&other.window)
            && prices_match(self.unit_price, other.unit_price, price_tolerance_pct)
    }
}

/// Relative price comparison; a zero price (unknown inventory estimate)
/// matches anything.
pub fn prices_match(a: f64, b: f64, tolerance_pct: f64) -> bool {
    if a == 0.0 || b == 0.0 {
        return true;
    }
    (a - b).abs() <= tolerance_pct * a.max(b)
}

/// Derive the deterministic trade id from the matching key. Prices are
/// keyed at milli-unit precision so tolerance-merged records land on the
/// canonical (marketplace-side) price.
pub fn derive_trade_id(
    item_id: &str,
    quantity: i64,
    unit_price: f64,
    seller_id: Option<&str>,
    buyer_id: Option<&str>,
    lower: DateTime<Utc>,
) -> String {
    let price_milli = (unit_price * 1000.0).round() as i64;
    format!(
        "t:{}:{}:{}:{}:{}:{}",
        lower.timestamp(),
        item_id,
        quantity,
        price_milli,
        seller_id.unwrap_or("?"),
        buyer_id.unwrap_or("?"),
    )
}
