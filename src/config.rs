//! Pipeline configuration from environment variables
//!
//! ## Environment Variables
//!
//! - FARM_SNAPSHOT_DIR - farm snapshot pulls (default: data/farms)
//! - MARKET_SNAPSHOT_DIR - marketplace pulls (default: data/marketplace)
//! - ITEM_CATALOG_PATH - item catalog (default: data/item_catalog.json)
//! - FARM_LIST_PATH - tracked farm ids (default: data/farms.txt)
//! - DASHBOARD_OUTPUT_PATH - dashboard document (default: web/data/summary.json)
//! - LEDGER_HISTORY_PATH - trade history dir, or SQLite db path with --backend sqlite
//! - EXPECTED_CYCLE_SECS - collector cadence (default: 3600)
//! - LOW_CONFIDENCE_GAP_FACTOR - gap multiplier for the tag (default: 2.0)
//! - KNOWN_SINK_ALLOWANCE / KNOWN_SOURCE_ALLOWANCE - per-item deltas
//!   explained by non-trade activity (default: 0)
//! - PRICE_TOLERANCE_PCT - relative merge tolerance (default: 0.05)
//! - TRADE_CURRENCY - balance key for price estimates (default: SFL)
//! - TOP_TRADERS_LIMIT / RECENT_ACTIVITY_LIMIT - dashboard sizes

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Jsonl,
    Sqlite,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub backend: BackendType,
    pub farm_snapshot_dir: PathBuf,
    pub market_snapshot_dir: PathBuf,
    pub item_catalog_path: PathBuf,
    pub farm_list_path: PathBuf,
    pub dashboard_output_path: PathBuf,
    pub ledger_history_path: PathBuf,
    pub expected_cycle_secs: i64,
    pub low_confidence_gap_factor: f64,
    pub known_sink_allowance: i64,
    pub known_source_allowance: i64,
    pub price_tolerance_pct: f64,
    pub trade_currency: String,
    pub top_traders_limit: usize,
    pub recent_activity_limit: usize,
}

fn parse_backend_from_args() -> BackendType {
    let args: Vec<String> = env::args().collect();
    if let Some(idx) = args.iter().position(|x| x == "--backend") {
        match args.get(idx + 1).map(|s| s.as_str()) {
            Some("sqlite") => return BackendType::Sqlite,
            Some("jsonl") => return BackendType::Jsonl,
            _ => {}
        }
    }
    BackendType::Jsonl
}

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = parse_backend_from_args();

        let ledger_history_path = match backend {
            BackendType::Sqlite => env::var("LEDGER_HISTORY_PATH")
                .unwrap_or_else(|_| "data/farmflow.db".to_string()),
            BackendType::Jsonl => {
                env::var("LEDGER_HISTORY_PATH").unwrap_or_else(|_| "history".to_string())
            }
        };

        let config = Self {
            backend,
            farm_snapshot_dir: env::var("FARM_SNAPSHOT_DIR")
                .unwrap_or_else(|_| "data/farms".to_string())
                .into(),
            market_snapshot_dir: env::var("MARKET_SNAPSHOT_DIR")
                .unwrap_or_else(|_| "data/marketplace".to_string())
                .into(),
            item_catalog_path: env::var("ITEM_CATALOG_PATH")
                .unwrap_or_else(|_| "data/item_catalog.json".to_string())
                .into(),
            farm_list_path: env::var("FARM_LIST_PATH")
                .unwrap_or_else(|_| "data/farms.txt".to_string())
                .into(),
            dashboard_output_path: env::var("DASHBOARD_OUTPUT_PATH")
                .unwrap_or_else(|_| "web/data/summary.json".to_string())
                .into(),
            ledger_history_path: ledger_history_path.into(),
            expected_cycle_secs: env_or("EXPECTED_CYCLE_SECS", 3600),
            low_confidence_gap_factor: env_or("LOW_CONFIDENCE_GAP_FACTOR", 2.0),
            known_sink_allowance: env_or("KNOWN_SINK_ALLOWANCE", 0),
            known_source_allowance: env_or("KNOWN_SOURCE_ALLOWANCE", 0),
            price_tolerance_pct: env_or("PRICE_TOLERANCE_PCT", 0.05),
            trade_currency: env::var("TRADE_CURRENCY").unwrap_or_else(|_| "SFL".to_string()),
            top_traders_limit: env_or("TOP_TRADERS_LIMIT", 10),
            recent_activity_limit: env_or("RECENT_ACTIVITY_LIMIT", 20),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.expected_cycle_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "EXPECTED_CYCLE_SECS must be positive".to_string(),
            ));
        }
        if self.low_confidence_gap_factor < 1.0 {
            return Err(ConfigError::InvalidValue(
                "LOW_CONFIDENCE_GAP_FACTOR must be >= 1.0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.price_tolerance_pct) {
            return Err(ConfigError::InvalidValue(
                "PRICE_TOLERANCE_PCT must be in [0.0, 1.0)".to_string(),
            ));
        }
        if self.known_sink_allowance < 0 || self.known_source_allowance < 0 {
            return Err(ConfigError::InvalidValue(
                "sink/source allowances must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
