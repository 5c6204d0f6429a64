pub mod catalog;
pub mod config;
pub mod ledger_core;
pub mod pipeline;
pub mod snapshot_core;

use config::PipelineConfig;

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = PipelineConfig::from_env()?;
    let summary = pipeline::run(&config).await?;

    log::info!(
        "✅ Run complete: {} new trade(s), {} total, {} unresolved",
        summary.new_trades,
        summary.total_trades,
        summary.unresolved_trades
    );

    Ok(())
}
