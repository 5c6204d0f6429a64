//! Trade ledger builder
//!
//! Merges inventory-inferred candidates with marketplace-confirmed
//! transactions into the canonical, deduplicated trade record set.
//! Marketplace-side fields (price, counterpart identity) take precedence
//! over inventory estimates: the listing feed carries authoritative
//! price/identity data while the farm delta only proves the
//! inventory-side effect occurred.

use super::trade::{derive_trade_id, prices_match, TradeRecord, TradeSource};
use crate::snapshot_core::{EventDirection, InventoryEvent, MarketTransaction};

pub struct LedgerBuilder {
    price_tolerance_pct: f64,
}

struct Candidate {
    event: InventoryEvent,
    consumed: bool,
}

impl LedgerBuilder {
    pub fn new(price_tolerance_pct: f64) -> Self {
        Self { price_tolerance_pct }
    }

    /// Build the canonical record set for one run.
    ///
    /// Output is sorted by (window lower bound, item id, trade id) and is
    /// byte-identical across re-runs over the same inputs: every merge
    /// decision iterates sorted collections and ids derive from the
    /// matching key.
    pub fn build(
        &self,
        mut inventory_events: Vec<InventoryEvent>,
        mut transactions: Vec<MarketTransaction>,
    ) -> Vec<TradeRecord> {
        inventory_events.sort_by(|a, b| {
            (a.window.lower, &a.item_id, &a.farm_id, a.quantity).cmp(&(
                b.window.lower,
                &b.item_id,
                &b.farm_id,
                b.quantity,
            ))
        });
        transactions.sort_by(|a, b| {
            (a.window.lower, &a.listing_id, a.quantity).cmp(&(
                b.window.lower,
                &b.listing_id,
                b.quantity,
            ))
        });

        let mut candidates: Vec<Candidate> = inventory_events
            .into_iter()
            .map(|event| Candidate {
                event,
                consumed: false,
            })
            .collect();

        let mut records = Vec::new();

        for txn in &transactions {
            // Seller-side corroboration: a matching inventory decrease on
            // the seller's farm upgrades the record to source=both
            let seller_match = self.find_candidate(&candidates, |c| {
                c.direction == EventDirection::Sale
                    && c.farm_id == txn.seller_id
                    && c.item_id == txn.item_id
                    && c.quantity == txn.quantity
                    && c.window.overlaps(&txn.window)
                    && self.price_compatible(c, txn.unit_price)
            });
            if let Some(idx) = seller_match {
                candidates[idx].consumed = true;
            }

            // Buyer resolution: the listing feed never exposes the buyer,
            // so correlate against farm-side acquisition candidates. Only
            // a unique match fills the identity in.
            let mut buyer_id = txn.buyer_id.clone();
            if buyer_id.is_none() {
                let matches: Vec<usize> = self.find_candidates(&candidates, |c| {
                    c.direction == EventDirection::Purchase
                        && c.item_id == txn.item_id
                        && c.quantity == txn.quantity
                        && c.window.overlaps(&txn.window)
                        && self.price_compatible(c, txn.unit_price)
                });
                match matches.as_slice() {
                    [idx] => {
                        buyer_id = Some(candidates[*idx].event.farm_id.clone());
                        candidates[*idx].consumed = true;
                    }
                    [] => {}
                    many => {
                        log::debug!(
                            "{} purchase candidates match listing {}, leaving buyer unresolved",
                            many.len(),
                            txn.listing_id
                        );
                    }
                }
            }

            let source = if seller_match.is_some() {
                TradeSource::Both
            } else {
                TradeSource::MarketplaceConfirmed
            };
            let unattributed = buyer_id.is_none();

            records.push(TradeRecord {
                trade_id: derive_trade_id(
                    &txn.item_id,
                    txn.quantity,
                    txn.unit_price,
                    Some(&txn.seller_id),
                    buyer_id.as_deref(),
                    txn.window.lower,
                ),
                window: txn.window,
                item_id: txn.item_id.clone(),
                quantity: txn.quantity,
                unit_price: txn.unit_price,
                buyer_id,
                seller_id: Some(txn.seller_id.clone()),
                source,
                low_confidence: false,
                multi_buyer_uncertain: txn.multi_buyer_uncertain,
                unattributed,
                assumed_zero_cost_basis: false,
            });
        }

        // Remaining inventory candidates stand on their own as
        // inventory-inferred records, except low-confidence ones that
        // would shadow an already-confirmed trade for the same item and
        // window involving the same farm.
        let mut suppressed = 0usize;
        for candidate in candidates.iter().filter(|c| !c.consumed) {
            let event = &candidate.event;
            if event.low_confidence && self.shadowed_by_confirmed(&records, event) {
                suppressed += 1;
                continue;
            }

            let (seller_id, buyer_id) = match event.direction {
                EventDirection::Sale => (Some(event.farm_id.clone()), None),
                EventDirection::Purchase => (None, Some(event.farm_id.clone())),
            };
            let unit_price = event.est_unit_price.unwrap_or(0.0);

            records.push(TradeRecord {
                trade_id: derive_trade_id(
                    &event.item_id,
                    event.quantity,
                    unit_price,
                    seller_id.as_deref(),
                    buyer_id.as_deref(),
                    event.window.lower,
                ),
                window: event.window,
                item_id: event.item_id.clone(),
                quantity: event.quantity,
                unit_price,
                buyer_id,
                seller_id,
                source: TradeSource::InventoryInferred,
                low_confidence: event.low_confidence,
                multi_buyer_uncertain: false,
                unattributed: true,
                assumed_zero_cost_basis: false,
            });
        }
        if suppressed > 0 {
            log::debug!(
                "Suppressed {} low-confidence candidate(s) shadowed by confirmed trades",
                suppressed
            );
        }

        self.dedup(records)
    }

    fn price_compatible(&self, event: &InventoryEvent, unit_price: f64) -> bool {
        match event.est_unit_price {
            Some(est) => prices_match(est, unit_price, self.price_tolerance_pct),
            None => true,
        }
    }

    fn find_candidate<F>(&self, candidates: &[Candidate], pred: F) -> Option<usize>
    where
        F: Fn(&InventoryEvent) -> bool,
    {
        candidates
            .iter()
            .position(|c| !c.consumed && pred(&c.event))
    }

    fn find_candidates<F>(&self, candidates: &[Candidate], pred: F) -> Vec<usize>
    where
        F: Fn(&InventoryEvent) -> bool,
    {
        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.consumed && pred(&c.event))
            .map(|(idx, _)| idx)
            .collect()
    }

    fn shadowed_by_confirmed(&self, records: &[TradeRecord], event: &InventoryEvent) -> bool {
        records.iter().any(|r| {
            r.source != TradeSource::InventoryInferred
                && r.item_id == event.item_id
                && r.window.overlaps(&event.window)
                && (r.seller_id.as_deref() == Some(event.farm_id.as_str())
                    || r.buyer_id.as_deref() == Some(event.farm_id.as_str()))
        })
    }

    /// Final dedup: no two records may describe the same economic
    /// transfer. Duplicates merge toward the marketplace-sourced record.
    fn dedup(&self, records: Vec<TradeRecord>) -> Vec<TradeRecord> {
        let mut accepted: Vec<TradeRecord> = Vec::with_capacity(records.len());

        for record in records {
            let existing = accepted
                .iter_mut()
                .find(|r| r.same_transfer(&record, self.price_tolerance_pct));
            match existing {
                Some(kept) => merge_into(kept, record),
                None => accepted.push(record),
            }
        }

        for record in &mut accepted {
            record.trade_id = derive_trade_id(
                &record.item_id,
                record.quantity,
                record.unit_price,
                record.seller_id.as_deref(),
                record.buyer_id.as_deref(),
                record.window.lower,
            );
        }

        accepted.sort_by(|a, b| {
            (a.window.lower, &a.item_id, &a.trade_id).cmp(&(b.window.lower, &b.item_id, &b.trade_id))
        });
        accepted
    }
}

fn source_rank(source: TradeSource) -> u8 {
    match source {
        TradeSource::Both => 2,
        TradeSource::MarketplaceConfirmed => 1,
        TradeSource::InventoryInferred => 0,
    }
}

fn merge_into(kept: &mut TradeRecord, other: TradeRecord) {
    let cross_source = (kept.source == TradeSource::InventoryInferred)
        != (other.source == TradeSource::InventoryInferred);

    if source_rank(other.source) > source_rank(kept.source) {
        let fill_buyer = kept.buyer_id.clone();
        let fill_seller = kept.seller_id.clone();
        *kept = other.clone();
        if kept.buyer_id.is_none() {
            kept.buyer_id = fill_buyer;
        }
        if kept.seller_id.is_none() {
            kept.seller_id = fill_seller;
        }
    } else {
        if kept.buyer_id.is_none() {
            kept.buyer_id = other.buyer_id.clone();
        }
        if kept.seller_id.is_none() {
            kept.seller_id = other.seller_id.clone();
        }
    }

    if cross_source {
        kept.source = TradeSource::Both;
    }
    kept.multi_buyer_uncertain |= other.multi_buyer_uncertain;
    // Confirmed evidence outweighs a weakly-sampled inventory delta
    kept.low_confidence &= other.low_confidence;
    kept.unattributed = kept.buyer_id.is_none() || kept.seller_id.is_none();
}
