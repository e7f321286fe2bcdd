//! Startup configuration.
//!
//! Layered the way the rest of this codebase loads it: a `.env` file seeds
//! process environment via `dotenv`, then `clap`'s `env` feature lets every
//! flag fall back to its environment variable, so the same `EngineConfig`
//! comes out of a bare `cargo run`, a container with env vars set, or an
//! operator passing explicit flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

const DEFAULT_UNIVERSE: &[&str] = &[
    "EURUSD", "GBPUSD", "USDJPY", "AUDUSD", "USDCAD", "USDCHF", "NZDUSD", "EURGBP", "EURJPY",
    "GBPJPY", "AUDJPY", "GBPAUD", "EURCAD", "EURAUD", "GOLD", "SILVER", "OIL", "COPPER",
    "NATURALGAS", "SPX500", "NASDAQ", "DJI", "FTSE100", "DAX", "NIKKEI", "BTCUSD", "ETHUSD",
    "BNBUSD", "XRPUSD", "ADAUSD", "SOLUSD",
];

pub const DEFAULT_BACKFILL_SYMBOLS: &[&str] = &["EURUSD", "GBPUSD", "USDJPY", "GOLD", "BTCUSD"];

#[derive(Parser, Debug, Clone)]
#[command(name = "quote-engine")]
#[command(about = "Market-data ingestion and trade-evaluation engine")]
pub struct EngineConfig {
    /// Path to the sqlite database file.
    #[arg(long, env = "DATABASE_PATH", default_value = "./quote_engine.db")]
    pub database_path: PathBuf,

    /// Port the Read API listens on.
    #[arg(long, env = "HTTP_PORT", default_value_t = 8888)]
    pub http_port: u16,

    /// Poll interval while the market-open heuristic says open, in seconds.
    #[arg(long, env = "POLL_INTERVAL_OPEN", default_value_t = 2)]
    pub poll_interval_open: u64,

    /// Poll interval while the market-open heuristic says closed, in seconds.
    #[arg(long, env = "POLL_INTERVAL_CLOSED", default_value_t = 5)]
    pub poll_interval_closed: u64,

    /// Freshness window for the poller's own cache reads, in seconds.
    #[arg(long, env = "CACHE_TTL_POLLER", default_value_t = 2)]
    pub cache_ttl_poller: u64,

    /// Freshness window for the Read API's cache reads, in seconds.
    #[arg(long, env = "CACHE_TTL_API", default_value_t = 5)]
    pub cache_ttl_api: u64,

    /// Number of days of 1-minute bars to backfill per whitelisted symbol.
    #[arg(long, env = "BACKFILL_DAYS", default_value_t = 7)]
    pub backfill_days: u32,

    /// Comma-separated whitelist of symbols backfilled at startup. Defaults
    /// to the built-in whitelist when empty.
    #[arg(long, env = "BACKFILL_SYMBOLS", value_delimiter = ',')]
    pub backfill_symbols: Vec<String>,

    /// Path to the persisted backfill watermark file.
    #[arg(long, env = "WATERMARK_PATH", default_value = ".last_history_load")]
    pub watermark_path: PathBuf,

    /// Optional TOML file of instrument registry overrides.
    #[arg(long, env = "REGISTRY_FILE")]
    pub registry_file: Option<PathBuf>,

    /// Comma-separated universe of symbols to poll. Defaults to the built-in set.
    #[arg(long, env = "UNIVERSE", value_delimiter = ',')]
    pub universe: Vec<String>,

    /// Whether Mark-to-Market is restricted to positions opened today.
    /// Preserved from the source system as a flag rather than baked in,
    /// see the Open Questions in DESIGN.md.
    #[arg(long, env = "MARK_TO_MARKET_TODAY_ONLY", default_value_t = true)]
    pub mark_to_market_today_only: bool,
}

impl EngineConfig {
    /// Load configuration from `.env`, environment, and CLI flags.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = EngineConfig::parse();
        if config.universe.is_empty() {
            config.universe = DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect();
        }
        if config.backfill_symbols.is_empty() {
            config.backfill_symbols = DEFAULT_BACKFILL_SYMBOLS.iter().map(|s| s.to_string()).collect();
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.http_port == 0 {
            anyhow::bail!("http_port must be nonzero");
        }
        if self.universe.is_empty() {
            anyhow::bail!("universe must not be empty");
        }
        self.database_path
            .parent()
            .map(|parent| {
                if parent.as_os_str().is_empty() {
                    Ok(())
                } else {
                    std::fs::create_dir_all(parent)
                        .context("failed to create database directory")
                }
            })
            .transpose()?;
        Ok(())
    }
}
