//! Profit aggregation over the canonical ledger
//!
//! Full recompute every run: the whole record set (prior history plus
//! the current run) is replayed in ledger order, so analytics never
//! drift from the ledger. Cost basis is FIFO per (player, item).

use super::trade::TradeRecord;
use crate::catalog::ItemCatalog;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// One FIFO acquisition lot.
#[derive(Debug, Clone, Copy)]
struct Lot {
    quantity: i64,
    unit_cost: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBreakdown {
    pub quantity_bought: i64,
    pub quantity_sold: i64,
    pub realized_profit: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub player_id: String,
    pub realized_profit: f64,
    pub total_volume_bought: f64,
    pub total_volume_sold: f64,
    pub trade_count: usize,
    pub avg_buy_price: f64,
    pub avg_sell_price: f64,
    pub profit_margin: f64,
    pub per_item: BTreeMap<String, ItemBreakdown>,
}

impl PlayerProfile {
    fn new(player_id: &str) -> Self {
        Self {
            player_id: player_id.to_string(),
            realized_profit: 0.0,
            total_volume_bought: 0.0,
            total_volume_sold: 0.0,
            trade_count: 0,
            avg_buy_price: 0.0,
            avg_sell_price: 0.0,
            profit_margin: 0.0,
            per_item: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStats {
    pub item_id: String,
    pub display_name: String,
    pub category: String,
    pub total_volume: i64,
    pub trade_count: usize,
    pub avg_price: f64,
    pub price_range: PriceRange,
}

pub struct AggregationResult {
    pub profiles: BTreeMap<String, PlayerProfile>,
    pub item_stats: BTreeMap<String, ItemStats>,
    pub unresolved_count: usize,
}

struct ItemAccumulator {
    total_volume: i64,
    trade_count: usize,
    priced_volume: i64,
    weighted_price_sum: f64,
    min_price: f64,
    max_price: f64,
}

pub struct ProfitAggregator<'a> {
    catalog: &'a ItemCatalog,
}

impl<'a> ProfitAggregator<'a> {
    pub fn new(catalog: &'a ItemCatalog) -> Self {
        Self { catalog }
    }

    /// Replay records in ledger order. Mutates records in place to set
    /// `assumed_zero_cost_basis` where a sale had no prior acquisition
    /// lots to draw from.
    pub fn aggregate(&self, records: &mut [TradeRecord]) -> AggregationResult {
        let mut profiles: BTreeMap<String, PlayerProfile> = BTreeMap::new();
        let mut lots: BTreeMap<(String, String), VecDeque<Lot>> = BTreeMap::new();
        let mut items: BTreeMap<String, ItemAccumulator> = BTreeMap::new();
        let mut unresolved_count = 0usize;

        for record in records.iter_mut() {
            let acc = items
                .entry(record.item_id.clone())
                .or_insert_with(|| ItemAccumulator {
                    total_volume: 0,
                    trade_count: 0,
                    priced_volume: 0,
                    weighted_price_sum: 0.0,
                    min_price: f64::INFINITY,
                    max_price: f64::NEG_INFINITY,
                });
            acc.total_volume += record.quantity;
            acc.trade_count += 1;
            // Zero prices are unknown inventory estimates, not free trades
            if record.unit_price > 0.0 {
                acc.priced_volume += record.quantity;
                acc.weighted_price_sum += record.unit_price * record.quantity as f64;
                acc.min_price = acc.min_price.min(record.unit_price);
                acc.max_price = acc.max_price.max(record.unit_price);
            }

            if !record.is_attributed() {
                unresolved_count += 1;
                continue;
            }

            // Both counterparties known past this point
            let buyer = record.buyer_id.clone().unwrap_or_default();
            let seller = record.seller_id.clone().unwrap_or_default();
            let qty = record.quantity;
            let volume = record.unit_price * qty as f64;

            let buyer_profile = profiles
                .entry(buyer.clone())
                .or_insert_with(|| PlayerProfile::new(&buyer));
            buyer_profile.total_volume_bought += volume;
            buyer_profile.trade_count += 1;
            buyer_profile
                .per_item
                .entry(record.item_id.clone())
                .or_default()
                .quantity_bought += qty;

            lots.entry((buyer.clone(), record.item_id.clone()))
                .or_default()
                .push_back(Lot {
                    quantity: qty,
                    unit_cost: record.unit_price,
                });

            let (cost_basis, assumed_zero) = consume_lots(
                lots.entry((seller.clone(), record.item_id.clone())).or_default(),
                qty,
            );
            record.assumed_zero_cost_basis = assumed_zero;

            let profit = volume - cost_basis;
            let seller_profile = profiles
                .entry(seller.clone())
                .or_insert_with(|| PlayerProfile::new(&seller));
            seller_profile.total_volume_sold += volume;
            seller_profile.realized_profit += profit;
            seller_profile.trade_count += 1;
            let breakdown = seller_profile
                .per_item
                .entry(record.item_id.clone())
                .or_default();
            breakdown.quantity_sold += qty;
            breakdown.realized_profit += profit;
        }

        for profile in profiles.values_mut() {
            let (bought_qty, sold_qty) = profile.per_item.values().fold((0i64, 0i64), |(b, s), i| {
                (b + i.quantity_bought, s + i.quantity_sold)
            });
            if bought_qty > 0 {
                profile.avg_buy_price = profile.total_volume_bought / bought_qty as f64;
            }
            if sold_qty > 0 {
                profile.avg_sell_price = profile.total_volume_sold / sold_qty as f64;
            }
            if profile.total_volume_sold > 0.0 {
                profile.profit_margin = profile.realized_profit / profile.total_volume_sold;
            }
        }

        let item_stats = items
            .into_iter()
            .map(|(item_id, acc)| {
                let avg_price = if acc.priced_volume > 0 {
                    acc.weighted_price_sum / acc.priced_volume as f64
                } else {
                    0.0
                };
                let (min, max) = if acc.min_price.is_finite() {
                    (acc.min_price, acc.max_price)
                } else {
                    (0.0, 0.0)
                };
                let stats = ItemStats {
                    display_name: self.catalog.display_name(&item_id),
                    category: self.catalog.category(&item_id),
                    item_id: item_id.clone(),
                    total_volume: acc.total_volume,
                    trade_count: acc.trade_count,
                    avg_price,
                    price_range: PriceRange { min, max },
                };
                (item_id, stats)
            })
            .collect();

        AggregationResult {
            profiles,
            item_stats,
            unresolved_count,
        }
    }
}

/// Pop FIFO lots covering `quantity`. Returns (cost basis, whether any
/// portion had no lot to draw from).
fn consume_lots(lots: &mut VecDeque<Lot>, mut quantity: i64) -> (f64, bool) {
    let mut cost = 0.0;
    while quantity > 0 {
        match lots.front_mut() {
            Some(lot) if lot.quantity > quantity => {
                cost += lot.unit_cost * quantity as f64;
                lot.quantity -= quantity;
                quantity = 0;
            }
            Some(lot) => {
                cost += lot.unit_cost * lot.quantity as f64;
                quantity -= lot.quantity;
                lots.pop_front();
            }
            None => {
                // No acquisition on record, proceeds count in full
                return (cost, true);
            }
        }
    }
    (cost, false)
}
