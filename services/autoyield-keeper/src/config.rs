//! Keeper Configuration
//!
//! Loaded from an optional file, `config/default`, `config/local` and
//! `AUTOYIELD__`-prefixed environment variables, in that order.

use std::path::PathBuf;
use std::time::Duration;

use autoyield_account::EntryPointConfig;
use autoyield_types::{Address, Assets};
use serde::{Deserialize, Serialize};

/// Keeper configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Entry point parameters
    #[serde(default)]
    pub chain: ChainSettings,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Demo world seeded at startup
    #[serde(default)]
    pub world: WorldSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Entry point parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Highest fee per gas the entry point accepts
    #[serde(default = "default_max_fee_per_gas")]
    pub max_fee_per_gas: u128,

    /// Fee recipient (hex address); derived from a label when unset
    pub beneficiary: Option<Address>,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            max_fee_per_gas: default_max_fee_per_gas(),
            beneficiary: None,
        }
    }
}

impl ChainSettings {
    pub fn entry_point_config(&self) -> EntryPointConfig {
        let defaults = EntryPointConfig::default();
        EntryPointConfig {
            chain_id: self.chain_id,
            max_fee_per_gas: self.max_fee_per_gas,
            beneficiary: self.beneficiary.unwrap_or(defaults.beneficiary),
            ..defaults
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Interval between rebalance ticks in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Ticks to run before exiting (0 = until interrupted)
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Recommendation feed (JSON); built-in feed when unset
    pub feed_path: Option<PathBuf>,

    /// Seed of the automation key the keeper signs with
    #[serde(default = "default_automation_seed")]
    pub automation_seed: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            ticks: default_ticks(),
            feed_path: None,
            automation_seed: default_automation_seed(),
        }
    }
}

impl SchedulerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Demo world seeded at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSettings {
    /// Label the demo token address is derived from
    #[serde(default = "default_token_label")]
    pub token_label: String,

    /// Seed of the account owner's key
    #[serde(default = "default_owner_seed")]
    pub owner_seed: String,

    /// Token units minted to the account
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Assets,

    /// Checking threshold configured on the account
    #[serde(default = "default_threshold")]
    pub checking_threshold: Assets,

    /// Native units prefunded for fees
    #[serde(default = "default_prefund")]
    pub prefund: Assets,

    /// Yield accrued per tick by every vault
    #[serde(default = "default_accrual")]
    pub accrual_per_tick: Assets,

    /// Token units spent per tick through an auto-yield call
    #[serde(default = "default_spend")]
    pub spend_per_tick: Assets,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            token_label: default_token_label(),
            owner_seed: default_owner_seed(),
            initial_balance: default_initial_balance(),
            checking_threshold: default_threshold(),
            prefund: default_prefund(),
            accrual_per_tick: default_accrual(),
            spend_per_tick: default_spend(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_chain_id() -> u64 {
    31337
}

fn default_max_fee_per_gas() -> u128 {
    100
}

fn default_tick_interval() -> u64 {
    1000
}

fn default_ticks() -> u64 {
    5
}

fn default_automation_seed() -> String {
    "autoyield-keeper".to_string()
}

fn default_token_label() -> String {
    "usdc".to_string()
}

fn default_owner_seed() -> String {
    "demo-owner".to_string()
}

fn default_initial_balance() -> Assets {
    10_000
}

fn default_threshold() -> Assets {
    1_000
}

fn default_prefund() -> Assets {
    100_000_000
}

fn default_accrual() -> Assets {
    25
}

fn default_spend() -> Assets {
    400
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl KeeperConfig {
    /// Load configuration from environment and optional config file
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        builder = builder.add_source(
            config::Environment::with_prefix("AUTOYIELD")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scheduler.tick_interval_ms == 0 {
            anyhow::bail!("scheduler.tick_interval_ms must be greater than zero");
        }
        Ok(())
    }
}
