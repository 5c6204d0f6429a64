//! Single-run batch orchestration
//!
//! One invocation per collection cycle: load inputs, infer trades,
//! rebuild analytics over the full ledger, publish the dashboard, then
//! persist the newly discovered records. Per-farm and per-cycle
//! failures are isolated; only missing run-level inputs (catalog, farm
//! list) abort before any output is written.

use crate::catalog::{CatalogError, ItemCatalog};
use crate::config::PipelineConfig;
use crate::ledger_core::{
    DashboardEmitter, HistoryError, LedgerBuilder, LedgerHistory, LedgerWriter, LedgerWriterError,
    ProfitAggregator, TradeRecord,
};
use crate::snapshot_core::{
    diff_farm_snapshots, load_farm_list, reconcile_marketplace, DiffConfig, InventoryEvent,
    MarketTransaction, SnapshotError, SnapshotStore,
};
use chrono::Utc;

#[derive(Debug)]
pub enum PipelineError {
    Catalog(CatalogError),
    Snapshot(SnapshotError),
    History(HistoryError),
    Writer(LedgerWriterError),
    Io(std::io::Error),
}

impl From<CatalogError> for PipelineError {
    fn from(err: CatalogError) -> Self {
        PipelineError::Catalog(err)
    }
}

impl From<SnapshotError> for PipelineError {
    fn from(err: SnapshotError) -> Self {
        PipelineError::Snapshot(err)
    }
}

impl From<HistoryError> for PipelineError {
    fn from(err: HistoryError) -> Self {
        PipelineError::History(err)
    }
}

impl From<LedgerWriterError> for PipelineError {
    fn from(err: LedgerWriterError) -> Self {
        PipelineError::Writer(err)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Catalog(e) => write!(f, "Catalog error: {}", e),
            PipelineError::Snapshot(e) => write!(f, "Snapshot error: {}", e),
            PipelineError::History(e) => write!(f, "History error: {}", e),
            PipelineError::Writer(e) => write!(f, "Writer error: {}", e),
            PipelineError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub farms_processed: usize,
    pub farms_skipped: usize,
    pub malformed_snapshots: usize,
    pub cycles_skipped: usize,
    pub new_trades: usize,
    pub total_trades: usize,
    pub unresolved_trades: usize,
}

/// Execute one full pipeline run.
pub async fn run(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    let catalog = ItemCatalog::load(&config.item_catalog_path)?;
    let farm_ids = load_farm_list(&config.farm_list_path)?;
    log::info!("🚜 Tracking {} farm(s)", farm_ids.len());

    let store = SnapshotStore::load(
        &config.farm_snapshot_dir,
        &config.market_snapshot_dir,
        &farm_ids,
    )?;

    let mut summary = RunSummary {
        farms_skipped: store.skipped_farms.len(),
        malformed_snapshots: store.malformed_count,
        ..RunSummary::default()
    };

    let diff_config = DiffConfig {
        known_sink_allowance: config.known_sink_allowance,
        known_source_allowance: config.known_source_allowance,
        expected_cycle_secs: config.expected_cycle_secs,
        low_confidence_gap_factor: config.low_confidence_gap_factor,
        trade_currency: config.trade_currency.clone(),
    };

    let mut inventory_events: Vec<InventoryEvent> = Vec::new();
    for (farm_id, snapshots) in store.farms() {
        let mut farm_ok = true;
        for pair in snapshots.windows(2) {
            match diff_farm_snapshots(&pair[0], &pair[1], &diff_config) {
                Ok(events) => inventory_events.extend(events),
                Err(e) => {
                    // A farm-id mismatch means the series itself is
                    // corrupt, not just one pair
                    log::error!("Skipping farm {}: {}", farm_id, e);
                    summary.farms_skipped += 1;
                    farm_ok = false;
                    break;
                }
            }
        }
        if farm_ok {
            summary.farms_processed += 1;
        }
    }

    let mut transactions: Vec<MarketTransaction> = Vec::new();
    for pair in store.marketplace().windows(2) {
        match reconcile_marketplace(&pair[0], &pair[1]) {
            Ok(cycle) => transactions.extend(cycle.transactions),
            Err(e) => {
                log::warn!("Skipping marketplace cycle: {}", e);
                summary.cycles_skipped += 1;
            }
        }
    }

    log::info!(
        "🔍 {} inventory candidate(s), {} marketplace transaction(s)",
        inventory_events.len(),
        transactions.len()
    );

    let history = LedgerHistory::load(config.backend, &config.ledger_history_path)?;

    let builder = LedgerBuilder::new(config.price_tolerance_pct);
    let built = builder.build(inventory_events, transactions);

    let new_records: Vec<TradeRecord> = built
        .into_iter()
        .filter(|r| !history.is_known(&r.trade_id))
        .collect();
    summary.new_trades = new_records.len();

    // Full recompute over history plus this run, in ledger order
    let mut all_records = history.records;
    all_records.extend(new_records.iter().cloned());
    all_records.sort_by(|a, b| {
        (a.window.lower, &a.item_id, &a.trade_id).cmp(&(b.window.lower, &b.item_id, &b.trade_id))
    });
    summary.total_trades = all_records.len();

    let aggregator = ProfitAggregator::new(&catalog);
    let result = aggregator.aggregate(&mut all_records);
    summary.unresolved_trades = result.unresolved_count;

    let emitter = DashboardEmitter::new(config.top_traders_limit, config.recent_activity_limit);
    let dashboard = emitter.assemble(&result, &all_records, Utc::now());
    emitter.write(&dashboard, &config.dashboard_output_path)?;

    // Persist only after the dashboard landed, so a failed run can be
    // retried without half-written history
    if !new_records.is_empty() {
        let cycle_ts = new_records
            .iter()
            .map(|r| r.window.upper)
            .max()
            .unwrap_or_else(Utc::now);
        let mut writer =
            LedgerWriter::new(config.backend, config.ledger_history_path.clone(), cycle_ts)?;
        log::info!("💾 Persisting via {} backend", writer.backend_type());
        for record in &new_records {
            writer.write_record(record).await?;
        }
        writer.flush().await?;
    }

    Ok(summary)
}
