//! Inventory-level trade inference from consecutive farm snapshots
//!
//! Pure diff over two immutable snapshots: no shared mutable inventory
//! state, so re-running over the same pair always yields the same
//! candidates.

use super::types::{FarmSnapshot, TimeWindow};
use std::collections::BTreeSet;

/// Differencer given snapshots for two different farms.
#[derive(Debug)]
pub struct MismatchedFarmError {
    pub expected: String,
    pub actual: String,
}

impl std::fmt::Display for MismatchedFarmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Snapshot pair spans different farms: {} vs {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for MismatchedFarmError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDirection {
    /// Quantity decreased beyond the known-sink allowance.
    Sale,
    /// Quantity increased beyond the known-source allowance.
    Purchase,
}

/// A candidate trade event inferred from an inventory delta.
#[derive(Debug, Clone)]
pub struct InventoryEvent {
    pub farm_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub direction: EventDirection,
    /// Unit-price estimate from the farm's currency balance delta, only
    /// available when the pair produced exactly one candidate.
    pub est_unit_price: Option<f64>,
    pub low_confidence: bool,
    pub window: TimeWindow,
}

#[derive(Debug, Clone)]
pub struct DiffConfig {
    /// Per-item quantity decrease explained by known consumption
    /// (crafting, feeding) rather than a sale.
    pub known_sink_allowance: i64,
    /// Per-item quantity increase explained by known production.
    pub known_source_allowance: i64,
    pub expected_cycle_secs: i64,
    /// Capture gaps beyond `factor * expected_cycle_secs` tag all
    /// candidates from the pair as low confidence.
    pub low_confidence_gap_factor: f64,
    /// Balance key used for unit-price estimation.
    pub trade_currency: String,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            known_sink_allowance: 0,
            known_source_allowance: 0,
            expected_cycle_secs: 3600,
            low_confidence_gap_factor: 2.0,
            trade_currency: "SFL".to_string(),
        }
    }
}

/// Diff two chronologically adjacent snapshots of the same farm into
/// candidate trade events.
///
/// Quantity deltas are computed per item; zero deltas are dropped, and
/// deltas within the sink/source allowances are treated as explained by
/// non-trade activity. The residual magnitude becomes the candidate
/// quantity.
pub fn diff_farm_snapshots(
    prev: &FarmSnapshot,
    next: &FarmSnapshot,
    config: &DiffConfig,
) -> Result<Vec<InventoryEvent>, MismatchedFarmError> {
    if prev.farm_id != next.farm_id {
        return Err(MismatchedFarmError {
            expected: prev.farm_id.clone(),
            actual: next.farm_id.clone(),
        });
    }

    let window = TimeWindow::new(prev.captured_at, next.captured_at);
    let low_confidence = window.gap_secs() as f64
        > config.low_confidence_gap_factor * config.expected_cycle_secs as f64;

    if low_confidence {
        log::debug!(
            "Capture gap of {}s exceeds expected cycle for farm {}, tagging candidates low-confidence",
            window.gap_secs(),
            prev.farm_id
        );
    }

    let items: BTreeSet<&String> = prev.inventory.keys().chain(next.inventory.keys()).collect();

    let mut events = Vec::new();
    for item_id in items {
        let delta = next.quantity(item_id) - prev.quantity(item_id);
        if delta == 0 {
            continue;
        }

        let (direction, magnitude) = if delta < 0 {
            (EventDirection::Sale, -delta - config.known_sink_allowance)
        } else {
            (EventDirection::Purchase, delta - config.known_source_allowance)
        };

        if magnitude <= 0 {
            continue;
        }

        events.push(InventoryEvent {
            farm_id: prev.farm_id.clone(),
            item_id: item_id.clone(),
            quantity: magnitude,
            direction,
            est_unit_price: None,
            low_confidence,
            window,
        });
    }

    // Single-candidate pairs can borrow the currency balance delta as a
    // price estimate; with multiple candidates the delta cannot be
    // allocated without guessing.
    if events.len() == 1 {
        let balance_delta =
            next.balance(&config.trade_currency) - prev.balance(&config.trade_currency);
        let event = &mut events[0];
        let sign_matches = match event.direction {
            EventDirection::Sale => balance_delta > 0.0,
            EventDirection::Purchase => balance_delta < 0.0,
        };
        if sign_matches && event.quantity > 0 {
            event.est_unit_price = Some(balance_delta.abs() / event.quantity as f64);
        }
    }

    Ok(events)
}
