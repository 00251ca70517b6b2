//! Protocol parameter cache.
//!
//! Decimal scales and protocol constants are resolved exactly once, before
//! anything else runs: from config when supplied, otherwise from the chain.
//! Any failure here is a deployment/configuration problem and is fatal.

use crate::config::InstanceConfig;
use crate::onchain::abi;
use crate::onchain::reader::{self, ChainReader, ReaderError};
use crate::onchain::units::{self, MAX_SCALE};
use crate::protocol::Deployment;

use alloy::primitives::Address;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum InitError {
    #[error("invalid {field} address {value:?}")]
    InvalidAddress { field: String, value: String },
    #[error("{0} is required but not configured")]
    MissingParameter(String),
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("failed to read {what} from chain: {source}")]
    Read {
        what: String,
        #[source]
        source: ReaderError,
    },
}

/// Immutable protocol constants shared by the calculator and the scanner.
#[derive(Debug, Clone)]
pub struct ProtocolParameters {
    pub cash_decimals: u32,
    pub share_decimals: u32,
    /// Present iff the deployment has bonds and a bond token address.
    pub bond_decimals: Option<u32>,
    pub distribution_period_secs: u64,
    /// Basis points of each expansion diverted away from the boardroom.
    pub shared_fund_percent: u32,
    /// Present iff the deployment has LP rewards.
    pub rewards_start_block: Option<u64>,
    pub total_reward_amount: Option<Decimal>,
    pub deployment: Deployment,
}

impl ProtocolParameters {
    /// `shared_fund_percent` as a fraction.
    pub fn shared_fund_fraction(&self) -> Decimal {
        Decimal::new(i64::from(self.shared_fund_percent), 4)
    }
}

fn read_err(what: impl Into<String>) -> impl FnOnce(ReaderError) -> InitError {
    let what = what.into();
    move |source| InitError::Read { what, source }
}

async fn decimals_of<R: ChainReader>(
    reader: &R,
    configured: Option<u32>,
    token: Address,
    name: &str,
) -> Result<u32, InitError> {
    let decimals = match configured {
        Some(d) => d,
        None => {
            let raw = reader::call_u64(reader, token, abi::DECIMALS)
                .await
                .map_err(read_err(format!("{name} decimals")))?;
            u32::try_from(raw).unwrap_or(u32::MAX)
        }
    };
    if decimals > MAX_SCALE {
        return Err(InitError::InvalidParameter {
            name: format!("{name}_decimals"),
            reason: format!("{decimals} exceeds supported scale {MAX_SCALE}"),
        });
    }
    Ok(decimals)
}

/// Build the parameter cache. Called once, before the monitor starts.
pub async fn initialize<R: ChainReader>(
    reader: &R,
    instance: &InstanceConfig,
) -> Result<ProtocolParameters, InitError> {
    let deployment = Deployment::from_config(instance)?;
    let contracts = &deployment.contracts;
    let features = deployment.features;

    let cash_decimals = decimals_of(reader, instance.cash_decimals, contracts.cash, "cash").await?;
    let share_decimals =
        decimals_of(reader, instance.share_decimals, contracts.share, "share").await?;
    // The bond token is only needed to report outstanding bonds; contraction
    // itself reads the burnable amount from the treasury.
    let bond_decimals = match (features.has_bonds, contracts.bond) {
        (true, Some(bond)) => Some(decimals_of(reader, instance.bond_decimals, bond, "bond").await?),
        _ => None,
    };

    let distribution_period_secs = match instance.distribution_period_secs {
        Some(p) => p,
        None => reader::call_u64(reader, contracts.treasury, abi::PERIOD)
            .await
            .map_err(read_err("treasury PERIOD"))?,
    };
    if distribution_period_secs == 0 {
        return Err(InitError::InvalidParameter {
            name: "distribution_period_secs".into(),
            reason: "must be greater than zero".into(),
        });
    }

    let shared_fund_percent = match (instance.shared_fund_percent, &instance.methods.shared_fund_percent) {
        (Some(bp), _) => u64::from(bp),
        (None, Some(method)) => reader::call_u64(reader, contracts.treasury, method)
            .await
            .map_err(read_err(method.clone()))?,
        (None, None) => 0,
    };
    if shared_fund_percent > 10_000 {
        return Err(InitError::InvalidParameter {
            name: "shared_fund_percent".into(),
            reason: format!("{shared_fund_percent} basis points exceeds 10000"),
        });
    }

    let (rewards_start_block, total_reward_amount) = if features.has_lp_rewards {
        let pool = contracts
            .reward_pool
            .ok_or_else(|| InitError::MissingParameter("contracts.reward_pool".into()))?;
        let start = match (instance.rewards_start_block, &instance.methods.rewards_start_block) {
            (Some(block), _) => block,
            (None, Some(method)) => reader::call_u64(reader, pool, method)
                .await
                .map_err(read_err(method.clone()))?,
            (None, None) => return Err(InitError::MissingParameter("rewards_start_block".into())),
        };
        let total = match (instance.total_reward_amount, &instance.methods.total_reward_amount) {
            (Some(amount), _) => amount,
            (None, Some(method)) => {
                let raw = reader::call_uint(reader, pool, method, &[])
                    .await
                    .map_err(read_err(method.clone()))?;
                units::to_decimal(raw, share_decimals)
                    .map_err(|e| read_err(method.clone())(e.into()))?
            }
            (None, None) => return Err(InitError::MissingParameter("total_reward_amount".into())),
        };
        (Some(start), Some(total))
    } else {
        (None, None)
    };

    let params = ProtocolParameters {
        cash_decimals,
        share_decimals,
        bond_decimals,
        distribution_period_secs,
        shared_fund_percent: shared_fund_percent as u32,
        rewards_start_block,
        total_reward_amount,
        deployment,
    };

    info!(
        cash_decimals = params.cash_decimals,
        share_decimals = params.share_decimals,
        bond_decimals = ?params.bond_decimals,
        period_secs = params.distribution_period_secs,
        shared_fund_bp = params.shared_fund_percent,
        features = ?features,
        "protocol parameters initialized"
    );

    Ok(params)
}
