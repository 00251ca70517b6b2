//! Protocol deployment description and the startup parameter cache.
//!
//! - `ProtocolFeatures`: optional capabilities a treasury fork may have
//! - `Deployment`: parsed contract addresses plus precomputed selectors/topics
//! - `ProtocolParameters`: constants fetched once at startup, immutable after

pub mod params;

pub use params::{initialize, InitError, ProtocolParameters};

use crate::config::InstanceConfig;
use crate::onchain::abi;

use alloy::primitives::{Address, B256};
use serde::Deserialize;
use std::str::FromStr;

/// Capabilities that vary between protocol forks. The calculator branches on
/// these flags, never on which fork it is talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProtocolFeatures {
    /// Bonds are sold during contraction (burnable amount is meaningful).
    /// On unless a deployment says otherwise; without it, at-or-below-peg is neutral.
    #[serde(default = "default_has_bonds")]
    pub has_bonds: bool,
    /// A share reward pool pays LP stakers from a fixed start block.
    #[serde(default)]
    pub has_lp_rewards: bool,
    /// A stableswap pool quotes a spot price for the cash token.
    #[serde(default)]
    pub has_stableswap: bool,
}

fn default_has_bonds() -> bool {
    true
}

impl Default for ProtocolFeatures {
    fn default() -> Self {
        Self {
            has_bonds: default_has_bonds(),
            has_lp_rewards: false,
            has_stableswap: false,
        }
    }
}

/// Contract addresses, parsed once.
#[derive(Debug, Clone)]
pub struct Contracts {
    pub cash: Address,
    pub share: Address,
    pub treasury: Address,
    pub boardroom: Address,
    pub bond: Option<Address>,
    pub reward_pool: Option<Address>,
    pub stableswap_pool: Option<Address>,
}

/// Fork-specific method signatures, with the ones the scanner matches on
/// already hashed.
#[derive(Debug, Clone)]
pub struct Methods {
    pub price: String,
    pub burnable: String,
    pub seigniorage_saved: Option<String>,
    pub policy_execution: String,
    pub policy_execution_selector: [u8; 4],
    pub distribution_event: String,
    pub distribution_topic: B256,
}

#[derive(Debug, Clone)]
pub struct Deployment {
    pub contracts: Contracts,
    pub methods: Methods,
    pub features: ProtocolFeatures,
    pub stableswap_quote_decimals: u32,
}

fn parse_address(field: &str, value: &str) -> Result<Address, InitError> {
    Address::from_str(value.trim()).map_err(|_| InitError::InvalidAddress {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn parse_optional(field: &str, value: &Option<String>) -> Result<Option<Address>, InitError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_address(field, v))
        .transpose()
}

impl Deployment {
    pub fn from_config(instance: &InstanceConfig) -> Result<Self, InitError> {
        let c = &instance.contracts;
        let contracts = Contracts {
            cash: parse_address("cash", &c.cash)?,
            share: parse_address("share", &c.share)?,
            treasury: parse_address("treasury", &c.treasury)?,
            boardroom: parse_address("boardroom", &c.boardroom)?,
            bond: parse_optional("bond", &c.bond)?,
            reward_pool: parse_optional("reward_pool", &c.reward_pool)?,
            stableswap_pool: parse_optional("stableswap_pool", &c.stableswap_pool)?,
        };

        let features = instance.features;
        if features.has_stableswap && contracts.stableswap_pool.is_none() {
            return Err(InitError::MissingParameter("contracts.stableswap_pool".into()));
        }

        let m = &instance.methods;
        let methods = Methods {
            price: m.price.clone(),
            burnable: m.burnable.clone(),
            seigniorage_saved: m.seigniorage_saved.clone().filter(|s| !s.is_empty()),
            policy_execution: m.policy_execution.clone(),
            policy_execution_selector: abi::selector(&m.policy_execution),
            distribution_event: m.distribution_event.clone(),
            distribution_topic: abi::topic(&m.distribution_event),
        };

        Ok(Self {
            contracts,
            methods,
            features,
            stableswap_quote_decimals: instance.stableswap_quote_decimals,
        })
    }
}
