//! Marketplace listing reconciliation across consecutive snapshots
//!
//! Classifies every listing present in either snapshot and resolves
//! fills into transactions. The listing feed does not expose buyer
//! identity, so `buyer_id` is always unresolved here and left to the
//! ledger builder's correlation pass.

use super::types::{Listing, ListingStatus, MarketplaceSnapshot, TimeWindow};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Reconciler given snapshots whose capture times are not strictly
/// increasing.
#[derive(Debug)]
pub struct OutOfOrderSnapshotError {
    pub prev: DateTime<Utc>,
    pub next: DateTime<Utc>,
}

impl std::fmt::Display for OutOfOrderSnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Marketplace snapshots out of order: {} followed by {}",
            self.prev, self.next
        )
    }
}

impl std::error::Error for OutOfOrderSnapshotError {}

/// Lifecycle classification of one listing between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingChange {
    Opened(String),
    StillOpen(String),
    Filled(String),
    PartiallyFilled(String),
    Cancelled(String),
}

/// A completed (full or partial) fill resolved from listing deltas.
#[derive(Debug, Clone)]
pub struct MarketTransaction {
    pub listing_id: String,
    pub seller_id: String,
    /// Not exposed by the listing feed; resolved later by correlation
    /// with farm-side acquisition candidates.
    pub buyer_id: Option<String>,
    pub item_id: String,
    pub quantity: i64,
    pub unit_price: f64,
    /// Partial fills may aggregate several buyers; listing data alone
    /// cannot split them, so one transaction covers the full delta.
    pub multi_buyer_uncertain: bool,
    pub window: TimeWindow,
}

#[derive(Debug)]
pub struct CycleReconciliation {
    pub window: TimeWindow,
    pub changes: Vec<ListingChange>,
    pub transactions: Vec<MarketTransaction>,
}

/// Reconcile two chronologically adjacent marketplace snapshots.
pub fn reconcile_marketplace(
    prev: &MarketplaceSnapshot,
    next: &MarketplaceSnapshot,
) -> Result<CycleReconciliation, OutOfOrderSnapshotError> {
    if next.captured_at <= prev.captured_at {
        return Err(OutOfOrderSnapshotError {
            prev: prev.captured_at,
            next: next.captured_at,
        });
    }

    let window = TimeWindow::new(prev.captured_at, next.captured_at);

    // BTreeMap keeps classification order deterministic across runs
    let before: BTreeMap<&str, &Listing> = prev
        .listings
        .iter()
        .map(|l| (l.listing_id.as_str(), l))
        .collect();
    let after: BTreeMap<&str, &Listing> = next
        .listings
        .iter()
        .map(|l| (l.listing_id.as_str(), l))
        .collect();

    let mut changes = Vec::new();
    let mut transactions = Vec::new();

    for (id, old) in &before {
        match after.get(id) {
            Some(new) => {
                if old.status != ListingStatus::Open {
                    // Terminal before this cycle; any fill was resolved
                    // when the transition itself was observed. Lingering
                    // terminal listings must not re-emit transactions.
                    log::debug!(
                        "Listing {} already terminal, nothing to resolve",
                        old.listing_id
                    );
                    continue;
                }
                match new.status {
                    ListingStatus::Filled => {
                        changes.push(ListingChange::Filled(old.listing_id.clone()));
                        if old.quantity > 0 {
                            transactions.push(fill_transaction(old, old.quantity, false, window));
                        }
                    }
                    ListingStatus::Cancelled => {
                        changes.push(ListingChange::Cancelled(old.listing_id.clone()));
                    }
                    ListingStatus::Open => {
                        let filled = old.quantity - new.quantity;
                        if filled > 0 && new.quantity == 0 {
                            // Fully consumed even though the feed still says open
                            changes.push(ListingChange::Filled(old.listing_id.clone()));
                            transactions.push(fill_transaction(old, filled, false, window));
                        } else if filled > 0 {
                            changes.push(ListingChange::PartiallyFilled(old.listing_id.clone()));
                            transactions.push(fill_transaction(old, filled, true, window));
                        } else {
                            changes.push(ListingChange::StillOpen(old.listing_id.clone()));
                        }
                    }
                }
            }
            None => match old.status {
                ListingStatus::Open => {
                    // Disappeared with no fill signal: cancelled, never a
                    // fabricated transaction
                    changes.push(ListingChange::Cancelled(old.listing_id.clone()));
                }
                ListingStatus::Filled | ListingStatus::Cancelled => {
                    // Terminal listing pruned by the feed, already handled
                    // in an earlier cycle
                    log::debug!("Terminal listing {} pruned from feed", old.listing_id);
                }
            },
        }
    }

    for (id, new) in &after {
        if !before.contains_key(id) {
            changes.push(ListingChange::Opened(new.listing_id.clone()));
            if new.status == ListingStatus::Filled {
                // First observed already filled; the filled amount is
                // unknowable from one observation
                log::debug!(
                    "Listing {} first observed in terminal state, no transaction resolved",
                    new.listing_id
                );
            }
        }
    }

    Ok(CycleReconciliation {
        window,
        changes,
        transactions,
    })
}

fn fill_transaction(
    listing: &Listing,
    quantity: i64,
    multi_buyer_uncertain: bool,
    window: TimeWindow,
) -> MarketTransaction {
    MarketTransaction {
        listing_id: listing.listing_id.clone(),
        seller_id: listing.seller_id.clone(),
        buyer_id: None,
        item_id: listing.item_id.clone(),
        quantity,
        unit_price: listing.unit_price,
        multi_buyer_uncertain,
        window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn listing(id: &str, seller: &str, item: &str, qty: i64, price: f64, status: ListingStatus) -> Listing {
        Listing {
            listing_id: id.to_string(),
            seller_id: seller.to_string(),
            item_id: item.to_string(),
            quantity: qty,
            unit_price: price,
            status,
        }
    }

    fn snapshot(hour: u32, listings: Vec<Listing>) -> MarketplaceSnapshot {
        MarketplaceSnapshot {
            captured_at: Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap(),
            listings,
        }
    }

    #[test]
    fn test_filled_listing_resolves_transaction() {
        let prev = snapshot(12, vec![listing("L1", "F1", "wheat", 20, 3.0, ListingStatus::Open)]);
        let next = snapshot(13, vec![listing("L1", "F1", "wheat", 0, 3.0, ListingStatus::Filled)]);

        let cycle = reconcile_marketplace(&prev, &next).unwrap();

        assert_eq!(cycle.transactions.len(), 1);
        let txn = &cycle.transactions[0];
        assert_eq!(txn.seller_id, "F1");
        assert_eq!(txn.quantity, 20);
        assert_eq!(txn.unit_price, 3.0);
        assert!(txn.buyer_id.is_none());
        assert!(!txn.multi_buyer_uncertain);
        assert!(cycle.changes.contains(&ListingChange::Filled("L1".to_string())));
    }

    #[test]
    fn test_partial_fill_flagged_multi_buyer_uncertain() {
        let prev = snapshot(12, vec![listing("L1", "F1", "wheat", 50, 3.0, ListingStatus::Open)]);
        let next = snapshot(13, vec![listing("L1", "F1", "wheat", 35, 3.0, ListingStatus::Open)]);

        let cycle = reconcile_marketplace(&prev, &next).unwrap();

        assert_eq!(cycle.transactions.len(), 1);
        assert_eq!(cycle.transactions[0].quantity, 15);
        assert!(cycle.transactions[0].multi_buyer_uncertain);
        assert!(cycle
            .changes
            .contains(&ListingChange::PartiallyFilled("L1".to_string())));
    }

    #[test]
    fn test_quantity_drained_to_zero_counts_as_fill() {
        let prev = snapshot(12, vec![listing("L1", "F1", "wheat", 20, 3.0, ListingStatus::Open)]);
        let next = snapshot(13, vec![listing("L1", "F1", "wheat", 0, 3.0, ListingStatus::Open)]);

        let cycle = reconcile_marketplace(&prev, &next).unwrap();

        assert_eq!(cycle.transactions.len(), 1);
        assert_eq!(cycle.transactions[0].quantity, 20);
        assert!(!cycle.transactions[0].multi_buyer_uncertain);
    }

    #[test]
    fn test_lingering_filled_listing_not_recounted() {
        // Cycle 1 observes the open->filled transition and resolves the
        // fill; the feed then keeps serving the terminal listing with
        // its original quantity
        let t0 = snapshot(12, vec![listing("L1", "F1", "wheat", 20, 3.0, ListingStatus::Open)]);
        let t1 = snapshot(13, vec![listing("L1", "F1", "wheat", 20, 3.0, ListingStatus::Filled)]);
        let t2 = snapshot(14, vec![listing("L1", "F1", "wheat", 20, 3.0, ListingStatus::Filled)]);

        let first = reconcile_marketplace(&t0, &t1).unwrap();
        assert_eq!(first.transactions.len(), 1);
        assert_eq!(first.transactions[0].quantity, 20);

        let second = reconcile_marketplace(&t1, &t2).unwrap();
        assert!(
            second.transactions.is_empty(),
            "already-resolved fill must not be counted again"
        );
    }

    #[test]
    fn test_lingering_cancelled_listing_ignored() {
        let t1 = snapshot(13, vec![listing("L1", "F1", "wheat", 20, 3.0, ListingStatus::Cancelled)]);
        let t2 = snapshot(14, vec![listing("L1", "F1", "wheat", 20, 3.0, ListingStatus::Cancelled)]);

        let cycle = reconcile_marketplace(&t1, &t2).unwrap();
        assert!(cycle.transactions.is_empty());
        assert!(cycle.changes.is_empty());
    }

    #[test]
    fn test_disappeared_open_listing_is_cancelled() {
        let prev = snapshot(12, vec![listing("L1", "F1", "wheat", 20, 3.0, ListingStatus::Open)]);
        let next = snapshot(13, vec![]);

        let cycle = reconcile_marketplace(&prev, &next).unwrap();

        assert!(cycle.transactions.is_empty());
        assert!(cycle.changes.contains(&ListingChange::Cancelled("L1".to_string())));
    }

    #[test]
    fn test_new_listing_classified_opened() {
        let prev = snapshot(12, vec![]);
        let next = snapshot(13, vec![listing("L2", "F2", "Stone", 5, 1.5, ListingStatus::Open)]);

        let cycle = reconcile_marketplace(&prev, &next).unwrap();

        assert!(cycle.transactions.is_empty());
        assert_eq!(cycle.changes, vec![ListingChange::Opened("L2".to_string())]);
    }

    #[test]
    fn test_unchanged_listing_still_open() {
        let prev = snapshot(12, vec![listing("L1", "F1", "wheat", 20, 3.0, ListingStatus::Open)]);
        let next = snapshot(13, vec![listing("L1", "F1", "wheat", 20, 3.0, ListingStatus::Open)]);

        let cycle = reconcile_marketplace(&prev, &next).unwrap();

        assert!(cycle.transactions.is_empty());
        assert_eq!(cycle.changes, vec![ListingChange::StillOpen("L1".to_string())]);
    }

    #[test]
    fn test_out_of_order_snapshots_rejected() {
        let prev = snapshot(13, vec![]);
        let next = snapshot(12, vec![]);

        assert!(reconcile_marketplace(&prev, &next).is_err());

        // Equal timestamps are also not strictly increasing
        let same = snapshot(13, vec![]);
        assert!(reconcile_marketplace(&prev, &same).is_err());
    }
}
