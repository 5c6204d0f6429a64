//! Pipeline Binary - Trade Inference and Profit Aggregation
//!
//! Runs one batch pass over collected snapshots: infers trades, rebuilds
//! analytics, publishes the dashboard and appends new records to the
//! persisted ledger.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin pipeline -- --backend sqlite
//! ```
//!
//! ## Environment Variables
//!
//! - FARM_SNAPSHOT_DIR - Farm snapshot pulls (default: data/farms)
//! - MARKET_SNAPSHOT_DIR - Marketplace pulls (default: data/marketplace)
//! - ITEM_CATALOG_PATH - Item catalog (default: data/item_catalog.json)
//! - FARM_LIST_PATH - Tracked farm ids (default: data/farms.txt)
//! - DASHBOARD_OUTPUT_PATH - Dashboard document (default: web/data/summary.json)
//! - LEDGER_HISTORY_PATH - Trade history (default: history, or data/farmflow.db with --backend sqlite)
//! - EXPECTED_CYCLE_SECS - Collector cadence (default: 3600)
//! - LOW_CONFIDENCE_GAP_FACTOR - Gap multiplier for the low-confidence tag (default: 2.0)
//! - KNOWN_SINK_ALLOWANCE / KNOWN_SOURCE_ALLOWANCE - Non-trade delta allowances (default: 0)
//! - PRICE_TOLERANCE_PCT - Relative price merge tolerance (default: 0.05)
//! - TRADE_CURRENCY - Balance key for price estimates (default: SFL)
//! - TOP_TRADERS_LIMIT / RECENT_ACTIVITY_LIMIT - Dashboard sizes
//! - RUST_LOG - Logging level (optional, default: info)

use farmflow::config::PipelineConfig;
use farmflow::pipeline;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = PipelineConfig::from_env()?;

    log::info!("🚀 Starting Trade Inference Pipeline");
    log::info!("   Farm snapshots: {}", config.farm_snapshot_dir.display());
    log::info!("   Marketplace snapshots: {}", config.market_snapshot_dir.display());
    log::info!("   Dashboard: {}", config.dashboard_output_path.display());
    log::info!("   Ledger history: {}", config.ledger_history_path.display());
    log::info!("   Expected cycle: {}s", config.expected_cycle_secs);
    log::info!("   Price tolerance: {}%", config.price_tolerance_pct * 100.0);

    let summary = pipeline::run(&config).await?;

    log::info!("✅ Run complete");
    log::info!("   Farms processed: {}", summary.farms_processed);
    log::info!("   Farms skipped: {}", summary.farms_skipped);
    log::info!("   Malformed snapshots: {}", summary.malformed_snapshots);
    log::info!("   Cycles skipped: {}", summary.cycles_skipped);
    log::info!("   New trades: {}", summary.new_trades);
    log::info!("   Ledger size: {}", summary.total_trades);
    log::info!("   Unresolved: {}", summary.unresolved_trades);

    Ok(())
}
