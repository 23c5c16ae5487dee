//! AutoYield Keeper
//!
//! Drives the auto-yield core from the outside: applies adapter
//! recommendations with the owner's key and triggers scheduled rebalances with
//! the account's automation key.
//!
//! # Usage
//!
//! ```bash
//! # Seed the demo world and run five scheduler ticks
//! autoyield-keeper run --ticks 5
//!
//! # Use a recommendation feed from disk
//! autoyield-keeper run --feed feed.json
//!
//! # Print the reference routing scenarios
//! autoyield-keeper simulate
//!
//! # Environment overrides
//! AUTOYIELD__WORLD__CHECKING_THRESHOLD=2000 autoyield-keeper run
//! ```

mod config;
mod keeper;
mod simulate;
mod world;

use std::path::PathBuf;

use autoyield_account::{apply_recommendation, RecommendationFeed};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{KeeperConfig, LoggingConfig};
use crate::keeper::Keeper;
use crate::world::DemoWorld;

// =============================================================================
// CLI Arguments
// =============================================================================

/// AutoYield Keeper - recommendation intake and scheduled rebalancing
#[derive(Parser, Debug)]
#[command(name = "autoyield-keeper")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "AUTOYIELD_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AUTOYIELD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "AUTOYIELD_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed the demo world, apply recommendations and run scheduler ticks
    Run {
        /// Ticks to run (0 = until interrupted)
        #[arg(long)]
        ticks: Option<u64>,

        /// Recommendation feed (JSON)
        #[arg(long)]
        feed: Option<PathBuf>,

        /// Milliseconds between ticks
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Run the reference routing scenarios and print the balances
    Simulate,
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut keeper_config = KeeperConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        keeper_config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        keeper_config.logging.format = format;
    }

    init_logging(&keeper_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        chain_id = keeper_config.chain.chain_id,
        "Starting AutoYield keeper"
    );

    match args.command {
        Command::Run {
            ticks,
            feed,
            interval_ms,
        } => {
            if let Some(ticks) = ticks {
                keeper_config.scheduler.ticks = ticks;
            }
            if feed.is_some() {
                keeper_config.scheduler.feed_path = feed;
            }
            if let Some(interval_ms) = interval_ms {
                keeper_config.scheduler.tick_interval_ms = interval_ms;
            }
            run(keeper_config).await
        }
        Command::Simulate => simulate(keeper_config).await,
    }
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .try_init()?;
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true))
                .try_init()?;
        }
    }

    Ok(())
}

fn load_feed(world: &DemoWorld, path: Option<&PathBuf>) -> anyhow::Result<RecommendationFeed> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let feed = RecommendationFeed::from_json(&json)?;
            tracing::info!(path = %path.display(), recommendations = feed.recommendations.len(), "recommendation feed loaded");
            Ok(feed)
        }
        None => Ok(world.default_feed()),
    }
}

// =============================================================================
// Commands
// =============================================================================

async fn run(config: KeeperConfig) -> anyhow::Result<()> {
    config.validate()?;
    let run_id = uuid::Uuid::new_v4();
    tracing::info!(%run_id, ticks = config.scheduler.ticks, "keeper run started");

    let world = DemoWorld::seed(&config).await?;
    let feed = load_feed(&world, config.scheduler.feed_path.as_ref())?;

    let mut keeper = Keeper::new(world.entry_point.clone(), world.automation.clone());
    for token in feed.tokens() {
        let Some(best) = feed.best_for(&token) else {
            continue;
        };
        match apply_recommendation(&world.entry_point, &world.account, best, &world.owner).await {
            Ok(Some(receipt)) if !receipt.success => {
                tracing::warn!(token = %token, reason = ?receipt.revert_reason, "recommendation reverted");
            }
            Ok(_) => keeper.watch(world.account, token),
            Err(e) => tracing::warn!(token = %token, code = e.code(), error = %e, "recommendation skipped"),
        }
    }

    let mut interval = tokio::time::interval(config.scheduler.tick_interval());
    let mut ticks_left = config.scheduler.ticks;
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }

        let now = chrono::Utc::now().timestamp().max(0) as u64;
        world.entry_point.set_timestamp(now).await;
        world.accrue(config.world.accrual_per_tick).await?;
        if config.world.spend_per_tick > 0 {
            let receipt = world.spend(config.world.spend_per_tick).await?;
            if !receipt.success {
                tracing::warn!(reason = ?receipt.revert_reason, "spend reverted");
            }
        }

        keeper.tick().await;
        let status = world.status().await?;
        tracing::info!(
            checking = status.checking,
            yield_value = status.yield_value,
            threshold = status.threshold,
            adapter = ?status.adapter,
            "account status"
        );

        if ticks_left > 0 {
            ticks_left -= 1;
            if ticks_left == 0 {
                break;
            }
        }
    }

    let status = world.status().await?;
    tracing::info!(%run_id, "keeper run finished");
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn simulate(config: KeeperConfig) -> anyhow::Result<()> {
    let reports = simulate::run_scenarios(&config).await?;

    println!("{:<24} {:>8} {:>10} {:>10}  {}", "scenario", "success", "checking", "yield", "detail");
    for report in &reports {
        println!(
            "{:<24} {:>8} {:>10} {:>10}  {}",
            report.name, report.success, report.checking, report.yield_value, report.detail
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_rejects_zero_interval() {
        let mut config = KeeperConfig::default();
        config.scheduler.tick_interval_ms = 0;
        assert!(run(config).await.is_err());
    }
}
