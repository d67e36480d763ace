//! SolSentry - resilient position risk engine for Solana tokens
//!
//! Paper-trading risk loop: real prices, simulated fills.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use solsentry::adapters::cli::{CliApp, Command, RunCmd, StatusCmd};
use solsentry::adapters::{HttpPriceOracle, PaperExecutor, RpcBalanceOracle};
use solsentry::clock::unix_ms;
use solsentry::config::{load_config, Config};
use solsentry::domain::PositionStore;
use solsentry::engine::{RiskEngine, Scheduler};
use solsentry::net::{EndpointPool, ResilientClient, ResponseCache};
use solsentry::ports::{BalanceOracle, PriceOracle, TradeExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    match app.command {
        Command::Run(cmd) => run_command(cmd, app.verbose, app.debug).await,
        Command::Status(cmd) => status_command(cmd, app.verbose, app.debug).await,
    }
}

/// Filter precedence: --debug, then --verbose, then RUST_LOG, then the
/// config file's level
fn init_logging(verbose: bool, debug: bool, config_level: &str) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level))
    };

    fmt().with_env_filter(filter).init();
}

async fn run_command(cmd: RunCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    init_logging(verbose, debug, &config.logging.level);

    tracing::info!("Starting SolSentry risk engine...");
    tracing::warn!("PAPER EXECUTION - fills are simulated, nothing is signed or broadcast");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let store = PositionStore::open(PositionStore::default_path(&data_dir))
        .context("Failed to open position store")?;

    let mut engine = build_engine(&config, store)?;
    let balances: Arc<dyn BalanceOracle> = Arc::new(RpcBalanceOracle::new(
        config.retry_settings().request_timeout,
    ));

    let (mut scheduler, shutdown) = Scheduler::new();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        shutdown.shutdown();
    });

    loop {
        if let Some(wallet) = &config.engine.wallet_address {
            if let Err(e) = engine.refresh_capital(&balances, wallet).await {
                tracing::warn!(error = %e, "capital refresh failed, keeping tracked figure");
            }
        }

        let now = unix_ms();
        match engine.tick(now).await {
            Ok(report) => {
                tracing::debug!(?report, capital = engine.capital(), "tick complete");
            }
            Err(e) => {
                tracing::error!(error = %e, "tick failed");
            }
        }

        let interval = Duration::from_millis(engine.active_profile().poll_interval_ms);
        if !scheduler.sleep(interval).await {
            break;
        }
    }

    tracing::info!("SolSentry stopped");
    Ok(())
}

async fn status_command(cmd: StatusCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    init_logging(verbose, debug, "warn");

    let store = PositionStore::open(PositionStore::default_path(&config.data_dir()))
        .context("Failed to open position store")?;

    let active = store.active_ids();
    println!("Positions: {} total, {} active", store.len(), active.len());

    let mut positions: Vec<_> = store.all().collect();
    positions.sort_by(|a, b| a.id.cmp(&b.id));
    for position in positions {
        let status = if position.is_active() {
            format!("active ({:+.1}%)", position.pnl_pct())
        } else {
            let closed_at = position
                .exit_time_ms
                .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms as i64))
                .map(|dt| dt.format(" %Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_default();
            format!("{:?}{closed_at}", position.status)
        };
        println!(
            "  {:<24} {:<8} {:<10} {}",
            position.id, position.symbol, position.role, status
        );
    }

    println!("Realized pnl: {:+.4}", store.realized_pnl_quote());
    Ok(())
}

fn build_engine(config: &Config, store: PositionStore) -> Result<RiskEngine> {
    let pool = Arc::new(EndpointPool::new(
        config.endpoints(),
        config.breaker_settings(),
    ));
    let cache = Arc::new(ResponseCache::new());
    let client = Arc::new(ResilientClient::new(pool, cache, config.retry_settings()));

    let oracle: Arc<dyn PriceOracle> = Arc::new(HttpPriceOracle::new(
        config.retry_settings().request_timeout,
    ));
    let executor: Arc<dyn TradeExecutor> = Arc::new(PaperExecutor::new(
        Arc::clone(&client),
        Arc::clone(&oracle),
    ));

    Ok(RiskEngine::new(
        store,
        client,
        oracle,
        executor,
        config.profile_table().context("Invalid profile table")?,
        config.exit_policy(),
        config.engine.starting_capital,
    ))
}
