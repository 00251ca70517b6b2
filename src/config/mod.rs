use crate::protocol::ProtocolFeatures;

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0} does not exist in configuration")]
    UnknownInstance(String),
    #[error("required setting '{0}' not configured")]
    MissingSetting(String),
    #[error("invalid setting '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// Whole config file: shared defaults plus one section per monitored deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub defaults: RuntimeConfig,
    #[serde(default)]
    pub instances: HashMap<String, InstanceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Scheduling/RPC settings. Every field is optional so an instance can
/// override just the ones it cares about on top of `[defaults]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// HTTP JSON-RPC endpoint - overridden by env SEIGNIORAGE_RPC_URL
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Snapshot refresh interval in seconds.
    #[serde(default)]
    pub refresh_rate_secs: Option<u64>,
    /// Block scan interval in seconds.
    #[serde(default)]
    pub scan_interval_secs: Option<u64>,
    /// Maximum number of blocks walked per scan step.
    #[serde(default)]
    pub max_range_size: Option<u64>,
}

/// One monitored protocol deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Token decimals; fetched via `decimals()` when absent.
    #[serde(default)]
    pub cash_decimals: Option<u32>,
    #[serde(default)]
    pub share_decimals: Option<u32>,
    #[serde(default)]
    pub bond_decimals: Option<u32>,
    /// Treasury epoch length; fetched via `PERIOD()` when absent.
    #[serde(default)]
    pub distribution_period_secs: Option<u64>,
    /// Share of seigniorage diverted away from the boardroom, in basis points.
    #[serde(default)]
    pub shared_fund_percent: Option<u32>,
    #[serde(default)]
    pub rewards_start_block: Option<u64>,
    /// Whole share tokens distributed by the LP reward pool.
    #[serde(default)]
    pub total_reward_amount: Option<Decimal>,
    /// Decimals of the token quoted by the stableswap pool.
    #[serde(default = "default_quote_decimals")]
    pub stableswap_quote_decimals: u32,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub features: ProtocolFeatures,
    #[serde(default)]
    pub methods: MethodsConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    pub cash: String,
    pub share: String,
    pub treasury: String,
    pub boardroom: String,
    #[serde(default)]
    pub bond: Option<String>,
    #[serde(default)]
    pub reward_pool: Option<String>,
    #[serde(default)]
    pub stableswap_pool: Option<String>,
}

/// Method and event signatures that differ between treasury forks.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodsConfig {
    #[serde(default = "default_price_method")]
    pub price: String,
    #[serde(default = "default_burnable_method")]
    pub burnable: String,
    #[serde(default = "default_policy_execution_method")]
    pub policy_execution: String,
    #[serde(default = "default_distribution_event")]
    pub distribution_event: String,
    /// Subtracted from cash total supply to get circulating supply.
    #[serde(default = "default_seigniorage_saved_method")]
    pub seigniorage_saved: Option<String>,
    /// Shared-fund getter on the treasury, used when `shared_fund_percent` is not configured.
    #[serde(default)]
    pub shared_fund_percent: Option<String>,
    /// Reward pool getters, used when the constants are not configured.
    #[serde(default)]
    pub rewards_start_block: Option<String>,
    #[serde(default)]
    pub total_reward_amount: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_cash_symbol")]
    pub cash_symbol: String,
    #[serde(default = "default_share_symbol")]
    pub share_symbol: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Discord-compatible webhook - overridden by env SEIGNIORAGE_WEBHOOK_URL
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Fully resolved scheduling settings for one instance.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub rpc_url: String,
    pub refresh_rate: Duration,
    pub scan_interval: Duration,
    pub max_range_size: u64,
}

/// A named instance with its runtime settings merged over the defaults.
#[derive(Debug, Clone)]
pub struct Instance {
    pub name: String,
    pub runtime: Runtime,
    pub settings: InstanceConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_quote_decimals() -> u32 {
    18
}
fn default_price_method() -> String {
    "getDollarPrice()".to_string()
}
fn default_burnable_method() -> String {
    "getBurnableDollarLeft()".to_string()
}
fn default_policy_execution_method() -> String {
    "allocateSeigniorage()".to_string()
}
fn default_distribution_event() -> String {
    "BoardroomFunded(uint256,uint256)".to_string()
}
fn default_seigniorage_saved_method() -> Option<String> {
    Some("seigniorageSaved()".to_string())
}
fn default_cash_symbol() -> String {
    "CASH".to_string()
}
fn default_share_symbol() -> String {
    "SHARE".to_string()
}

const DEFAULT_REFRESH_RATE_SECS: u64 = 60;
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;
const DEFAULT_MAX_RANGE_SIZE: u64 = 100;

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for MethodsConfig {
    fn default() -> Self {
        Self {
            price: default_price_method(),
            burnable: default_burnable_method(),
            policy_execution: default_policy_execution_method(),
            distribution_event: default_distribution_event(),
            seigniorage_saved: default_seigniorage_saved_method(),
            shared_fund_percent: None,
            rewards_start_block: None,
            total_reward_amount: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            cash_symbol: default_cash_symbol(),
            share_symbol: default_share_symbol(),
        }
    }
}

impl RuntimeConfig {
    /// Instance values win; anything unset falls back to `base`.
    pub fn merged_over(&self, base: &RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            rpc_url: self.rpc_url.clone().or_else(|| base.rpc_url.clone()),
            refresh_rate_secs: self.refresh_rate_secs.or(base.refresh_rate_secs),
            scan_interval_secs: self.scan_interval_secs.or(base.scan_interval_secs),
            max_range_size: self.max_range_size.or(base.max_range_size),
        }
    }

    pub fn resolve(&self) -> Result<Runtime, ConfigError> {
        let rpc_url = self
            .rpc_url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ConfigError::MissingSetting("rpc_url".into()))?;

        let refresh_rate_secs = self.refresh_rate_secs.unwrap_or(DEFAULT_REFRESH_RATE_SECS);
        let scan_interval_secs = self.scan_interval_secs.unwrap_or(DEFAULT_SCAN_INTERVAL_SECS);
        let max_range_size = self.max_range_size.unwrap_or(DEFAULT_MAX_RANGE_SIZE);

        for (name, value) in [
            ("refresh_rate_secs", refresh_rate_secs),
            ("scan_interval_secs", scan_interval_secs),
            ("max_range_size", max_range_size),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name: name.into(),
                    reason: "must be greater than zero".into(),
                });
            }
        }

        Ok(Runtime {
            rpc_url,
            refresh_rate: Duration::from_secs(refresh_rate_secs),
            scan_interval: Duration::from_secs(scan_interval_secs),
            max_range_size,
        })
    }
}

impl InstanceConfig {
    /// Feature flags must be backed by the contracts they need.
    fn validate(&self) -> Result<(), ConfigError> {
        let missing = |flag: &str, contract: &str| ConfigError::Invalid {
            name: format!("features.{flag}"),
            reason: format!("requires contracts.{contract}"),
        };
        if self.features.has_lp_rewards && self.contracts.reward_pool.is_none() {
            return Err(missing("has_lp_rewards", "reward_pool"));
        }
        if self.features.has_stableswap && self.contracts.stableswap_pool.is_none() {
            return Err(missing("has_stableswap", "stableswap_pool"));
        }
        if let Some(bp) = self.shared_fund_percent {
            if bp > 10_000 {
                return Err(ConfigError::Invalid {
                    name: "shared_fund_percent".into(),
                    reason: format!("{bp} basis points exceeds 10000"),
                });
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&contents)?;

        // Endpoints may carry API keys; allow keeping them out of the file
        config.apply_env_overrides(
            std::env::var("SEIGNIORAGE_RPC_URL").ok(),
            std::env::var("SEIGNIORAGE_WEBHOOK_URL").ok(),
        );

        Ok(config)
    }

    /// Replace the RPC/webhook endpoints everywhere they appear, instance
    /// sections included.
    pub fn apply_env_overrides(&mut self, rpc_url: Option<String>, webhook_url: Option<String>) {
        if let Some(url) = rpc_url {
            self.defaults.rpc_url = Some(url.clone());
            for instance in self.instances.values_mut() {
                instance.runtime.rpc_url = Some(url.clone());
            }
        }
        if let Some(url) = webhook_url {
            for instance in self.instances.values_mut() {
                instance.notify.webhook_url = Some(url.clone());
            }
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Resolve one named instance, merging its runtime settings over `[defaults]`.
    pub fn instance(&self, name: &str) -> Result<Instance, ConfigError> {
        let settings = self
            .instances
            .get(name)
            .ok_or_else(|| ConfigError::UnknownInstance(name.to_string()))?;
        settings.validate()?;

        let runtime = settings.runtime.merged_over(&self.defaults).resolve()?;

        Ok(Instance {
            name: name.to_string(),
            runtime,
            settings: settings.clone(),
        })
    }
}
