//! Epoch economic calculator.
//!
//! Reads treasury/boardroom state and derives one consistent `EpochSnapshot`:
//! epoch countdown, smoothed reference price, policy mode and the metrics that
//! only exist in that mode. Snapshots are always built whole and replaced
//! whole; nothing here mutates shared state.

pub mod countdown;

pub use countdown::EpochEta;

use crate::onchain::abi;
use crate::onchain::reader::{self, ChainReader, ReaderError};
use crate::onchain::units::{self, UnitsError};
use crate::protocol::{ProtocolFeatures, ProtocolParameters};

use alloy::primitives::U256;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

const SECONDS_PER_YEAR: u64 = 365 * 24 * 3600;

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Read(#[from] ReaderError),
    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

impl From<UnitsError> for RefreshError {
    fn from(e: UnitsError) -> Self {
        RefreshError::Read(e.into())
    }
}

/// Monetary policy the treasury will apply at the next epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    Expansion,
    Contraction,
    /// Price at or below peg on a deployment with no bond/burn mechanism.
    Neutral,
}

impl PolicyMode {
    /// Strictly above peg expands. At or below peg contracts, if the
    /// deployment can contract at all.
    pub fn for_price(reference_price: Decimal, features: ProtocolFeatures) -> Self {
        if reference_price > Decimal::ONE {
            PolicyMode::Expansion
        } else if features.has_bonds {
            PolicyMode::Contraction
        } else {
            PolicyMode::Neutral
        }
    }
}

impl std::fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyMode::Expansion => write!(f, "expansion"),
            PolicyMode::Contraction => write!(f, "contraction"),
            PolicyMode::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionMetrics {
    /// Fraction of circulating supply minted this epoch.
    pub expansion_rate: Decimal,
    pub seigniorage_amount: Decimal,
    /// Part of the seigniorage that reaches the boardroom.
    pub boardroom_amount: Decimal,
    /// Cash per staked share. `None` when nothing is staked.
    pub yield_per_share: Option<Decimal>,
    pub annualized_yield_per_share: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractionMetrics {
    /// Cash still redeemable for bonds this epoch, as reported by the treasury.
    pub burnable_amount: Decimal,
    pub outstanding_bonds: Option<Decimal>,
}

/// Mode-specific payload. Expansion and contraction figures can never coexist.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyState {
    Expansion(ExpansionMetrics),
    Contraction(ContractionMetrics),
    Neutral,
}

impl PolicyState {
    pub fn mode(&self) -> PolicyMode {
        match self {
            PolicyState::Expansion(_) => PolicyMode::Expansion,
            PolicyState::Contraction(_) => PolicyMode::Contraction,
            PolicyState::Neutral => PolicyMode::Neutral,
        }
    }
}

/// LP reward pool schedule relative to the current block.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardWindow {
    pub start_block: u64,
    pub current_block: u64,
    pub total_reward_amount: Decimal,
}

impl RewardWindow {
    pub fn started(&self) -> bool {
        self.current_block >= self.start_block
    }

    pub fn blocks_until_start(&self) -> u64 {
        self.start_block.saturating_sub(self.current_block)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochSnapshot {
    pub epoch: u64,
    /// Unix seconds at which the next epoch may be triggered.
    pub next_epoch_at: u64,
    pub eta: EpochEta,
    pub reference_price: Decimal,
    /// Cash total supply minus seigniorage held by the treasury.
    pub total_cash_supply: Decimal,
    pub boardroom_stake: Decimal,
    pub policy: PolicyState,
    /// Stableswap spot quote for one cash token, if the deployment has one.
    pub spot_price: Option<Decimal>,
    pub lp_rewards: Option<RewardWindow>,
    /// Unix seconds the snapshot was taken at.
    pub taken_at: u64,
}

impl EpochSnapshot {
    pub fn mode(&self) -> PolicyMode {
        self.policy.mode()
    }

    pub fn seigniorage_amount(&self) -> Option<Decimal> {
        match &self.policy {
            PolicyState::Expansion(m) => Some(m.seigniorage_amount),
            _ => None,
        }
    }

    pub fn yield_per_share(&self) -> Option<Decimal> {
        match &self.policy {
            PolicyState::Expansion(m) => m.yield_per_share,
            _ => None,
        }
    }

    pub fn burnable_amount(&self) -> Option<Decimal> {
        match &self.policy {
            PolicyState::Contraction(m) => Some(m.burnable_amount),
            _ => None,
        }
    }
}

/// Expansion arithmetic:
///   rate        = min(price - 1, max_expansion)
///   seigniorage = supply * rate
///   boardroom   = seigniorage * (1 - shared_fund)
///   yield       = boardroom / stake            (absent when stake is zero)
pub fn expansion_metrics(
    reference_price: Decimal,
    total_cash_supply: Decimal,
    boardroom_stake: Decimal,
    max_expansion: Decimal,
    shared_fund: Decimal,
    distribution_period_secs: u64,
) -> Result<ExpansionMetrics, RefreshError> {
    let expansion_rate = (reference_price - Decimal::ONE).min(max_expansion);
    let seigniorage_amount = total_cash_supply
        .checked_mul(expansion_rate)
        .ok_or(RefreshError::Overflow("seigniorage"))?;
    let boardroom_amount = seigniorage_amount
        .checked_mul(Decimal::ONE - shared_fund)
        .ok_or(RefreshError::Overflow("boardroom amount"))?;

    let yield_per_share = if boardroom_stake.is_zero() {
        None
    } else {
        boardroom_amount.checked_div(boardroom_stake)
    };

    let epochs_per_year =
        Decimal::from(SECONDS_PER_YEAR).checked_div(Decimal::from(distribution_period_secs));
    let annualized_yield_per_share = yield_per_share
        .zip(epochs_per_year)
        .and_then(|(y, n)| y.checked_mul(n));

    Ok(ExpansionMetrics {
        expansion_rate,
        seigniorage_amount,
        boardroom_amount,
        yield_per_share,
        annualized_yield_per_share,
    })
}

fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Build a fresh snapshot as of now.
pub async fn refresh<R: ChainReader>(
    reader: &R,
    params: &ProtocolParameters,
) -> Result<EpochSnapshot, RefreshError> {
    refresh_at(reader, params, unix_now()).await
}

/// Build a fresh snapshot, computing the countdown against `now` (unix seconds).
pub async fn refresh_at<R: ChainReader>(
    reader: &R,
    params: &ProtocolParameters,
    now: u64,
) -> Result<EpochSnapshot, RefreshError> {
    let deployment = &params.deployment;
    let contracts = &deployment.contracts;
    let methods = &deployment.methods;

    let (epoch, next_epoch_at, raw_price, raw_supply, raw_stake) = futures::try_join!(
        reader::call_u64(reader, contracts.treasury, abi::EPOCH),
        reader::call_u64(reader, contracts.treasury, abi::NEXT_EPOCH_POINT),
        reader::call_uint(reader, contracts.treasury, &methods.price, &[]),
        reader::call_uint(reader, contracts.cash, abi::TOTAL_SUPPLY, &[]),
        reader::call_uint(reader, contracts.boardroom, abi::TOTAL_SUPPLY, &[]),
    )?;

    let raw_saved = match &methods.seigniorage_saved {
        Some(method) => reader::call_uint(reader, contracts.treasury, method, &[]).await?,
        None => U256::ZERO,
    };

    let reference_price = units::to_decimal(raw_price, params.cash_decimals)?;
    let total_cash_supply =
        units::to_decimal(raw_supply.saturating_sub(raw_saved), params.cash_decimals)?;
    let boardroom_stake = units::to_decimal(raw_stake, params.share_decimals)?;

    let policy = match PolicyMode::for_price(reference_price, deployment.features) {
        PolicyMode::Expansion => {
            let raw_max = reader::call_uint(
                reader,
                contracts.treasury,
                abi::MAX_SUPPLY_EXPANSION_PERCENT,
                &[],
            )
            .await?;
            PolicyState::Expansion(expansion_metrics(
                reference_price,
                total_cash_supply,
                boardroom_stake,
                units::basis_points(raw_max)?,
                params.shared_fund_fraction(),
                params.distribution_period_secs,
            )?)
        }
        PolicyMode::Contraction => {
            let raw_burnable =
                reader::call_uint(reader, contracts.treasury, &methods.burnable, &[]).await?;
            let outstanding_bonds = match (contracts.bond, params.bond_decimals) {
                (Some(bond), Some(decimals)) => {
                    let raw = reader::call_uint(reader, bond, abi::TOTAL_SUPPLY, &[]).await?;
                    Some(units::to_decimal(raw, decimals)?)
                }
                _ => None,
            };
            PolicyState::Contraction(ContractionMetrics {
                burnable_amount: units::to_decimal(raw_burnable, params.cash_decimals)?,
                outstanding_bonds,
            })
        }
        PolicyMode::Neutral => PolicyState::Neutral,
    };

    let spot_price = match (deployment.features.has_stableswap, contracts.stableswap_pool) {
        (true, Some(pool)) => {
            let args = [U256::ZERO, U256::from(1), units::one_token(params.cash_decimals)];
            let raw = reader::call_uint(reader, pool, abi::GET_DY, &args).await?;
            Some(units::to_decimal(raw, deployment.stableswap_quote_decimals)?)
        }
        _ => None,
    };

    let lp_rewards = match (params.rewards_start_block, params.total_reward_amount) {
        (Some(start_block), Some(total_reward_amount)) => Some(RewardWindow {
            start_block,
            current_block: reader.block_number().await?,
            total_reward_amount,
        }),
        _ => None,
    };

    let snapshot = EpochSnapshot {
        epoch,
        next_epoch_at,
        eta: EpochEta::until(next_epoch_at, now),
        reference_price,
        total_cash_supply,
        boardroom_stake,
        policy,
        spot_price,
        lp_rewards,
        taken_at: now,
    };

    debug!(
        epoch = snapshot.epoch,
        price = %snapshot.reference_price,
        mode = %snapshot.mode(),
        supply = %snapshot.total_cash_supply,
        stake = %snapshot.boardroom_stake,
        "epoch snapshot refreshed"
    );

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onchain::mock::MockChain;
    use crate::protocol::fixtures::*;
    use crate::protocol::initialize;
    use rust_decimal::prelude::ToPrimitive;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn wei(s: &str) -> U256 {
        let d = dec(s) * Decimal::from(1_000_000_000_000_000_000u64);
        U256::from(d.to_u128().unwrap())
    }

    /// A chain where price, supply and stake are scripted in whole tokens (18 decimals).
    async fn setup(price: &str, supply: &str, stake: &str) -> (MockChain, ProtocolParameters) {
        let chain = MockChain::new();
        let mut config = instance_config();
        config.cash_decimals = Some(18);
        config.share_decimals = Some(18);
        config.bond_decimals = Some(18);
        config.distribution_period_secs = Some(21_600);
        let params = initialize(&chain, &config).await.unwrap();

        chain.set_uint(TREASURY, abi::EPOCH, U256::from(42));
        chain.set_uint(TREASURY, abi::NEXT_EPOCH_POINT, U256::from(10_000 + 3 * 3600 + 125));
        chain.set_uint(TREASURY, "getDollarPrice()", wei(price));
        chain.set_uint(TREASURY, "seigniorageSaved()", U256::ZERO);
        chain.set_uint(TREASURY, abi::MAX_SUPPLY_EXPANSION_PERCENT, U256::from(300));
        chain.set_uint(TREASURY, "getBurnableDollarLeft()", wei("1234.5"));
        chain.set_uint(CASH, abi::TOTAL_SUPPLY, wei(supply));
        chain.set_uint(BOARDROOM, abi::TOTAL_SUPPLY, wei(stake));
        chain.set_uint(BOND, abi::TOTAL_SUPPLY, wei("800"));
        (chain, params)
    }

    #[test]
    fn test_expansion_arithmetic() {
        let m = expansion_metrics(
            dec("1.05"),
            Decimal::from(1000),
            Decimal::from(500),
            dec("0.03"),
            Decimal::ZERO,
            21_600,
        )
        .unwrap();
        assert_eq!(m.expansion_rate, dec("0.03"));
        assert_eq!(m.seigniorage_amount, Decimal::from(30));
        assert_eq!(m.boardroom_amount, Decimal::from(30));
        assert_eq!(m.yield_per_share, Some(dec("0.06")));
        // 1460 epochs per year at 6h
        assert_eq!(m.annualized_yield_per_share, Some(dec("87.6")));
    }

    #[test]
    fn test_expansion_below_cap_and_shared_fund() {
        let m = expansion_metrics(
            dec("1.01"),
            Decimal::from(1000),
            Decimal::from(100),
            dec("0.03"),
            dec("0.25"),
            21_600,
        )
        .unwrap();
        assert_eq!(m.expansion_rate, dec("0.01"));
        assert_eq!(m.seigniorage_amount, Decimal::from(10));
        assert_eq!(m.boardroom_amount, dec("7.5"));
        assert_eq!(m.yield_per_share, Some(dec("0.075")));
    }

    #[test]
    fn test_zero_stake_yield_unavailable() {
        let m = expansion_metrics(
            dec("1.05"),
            Decimal::from(1000),
            Decimal::ZERO,
            dec("0.03"),
            Decimal::ZERO,
            21_600,
        )
        .unwrap();
        assert_eq!(m.seigniorage_amount, Decimal::from(30));
        assert_eq!(m.yield_per_share, None);
        assert_eq!(m.annualized_yield_per_share, None);
    }

    #[test]
    fn test_mode_boundaries() {
        let bonds = ProtocolFeatures { has_bonds: true, ..Default::default() };
        let no_bonds = ProtocolFeatures { has_bonds: false, ..Default::default() };

        assert_eq!(PolicyMode::for_price(dec("1.0001"), bonds), PolicyMode::Expansion);
        assert_eq!(PolicyMode::for_price(Decimal::ONE, bonds), PolicyMode::Contraction);
        assert_eq!(PolicyMode::for_price(dec("0.5"), bonds), PolicyMode::Contraction);
        assert_eq!(PolicyMode::for_price(Decimal::ONE, no_bonds), PolicyMode::Neutral);
        assert_eq!(PolicyMode::for_price(dec("1.2"), no_bonds), PolicyMode::Expansion);
    }

    #[tokio::test]
    async fn test_refresh_expansion() {
        let (chain, params) = setup("1.05", "1000", "500").await;
        let snapshot = refresh_at(&chain, &params, 10_000).await.unwrap();

        assert_eq!(snapshot.epoch, 42);
        assert_eq!(snapshot.eta, EpochEta { hours: 3, minutes: 2 });
        assert_eq!(snapshot.reference_price, dec("1.05"));
        assert_eq!(snapshot.mode(), PolicyMode::Expansion);
        assert_eq!(snapshot.seigniorage_amount(), Some(Decimal::from(30)));
        assert_eq!(snapshot.yield_per_share(), Some(dec("0.06")));
        assert_eq!(snapshot.burnable_amount(), None);
        assert_eq!(snapshot.spot_price, None);
        assert_eq!(snapshot.lp_rewards, None);
    }

    #[tokio::test]
    async fn test_refresh_subtracts_saved_seigniorage() {
        let (chain, params) = setup("1.05", "1100", "500").await;
        chain.set_uint(TREASURY, "seigniorageSaved()", wei("100"));
        let snapshot = refresh_at(&chain, &params, 10_000).await.unwrap();

        assert_eq!(snapshot.total_cash_supply, Decimal::from(1000));
        assert_eq!(snapshot.seigniorage_amount(), Some(Decimal::from(30)));
    }

    #[tokio::test]
    async fn test_refresh_contraction_reads_burnable_unmodified() {
        let (chain, params) = setup("0.92", "1000", "500").await;
        let snapshot = refresh_at(&chain, &params, 10_000).await.unwrap();

        assert_eq!(snapshot.mode(), PolicyMode::Contraction);
        assert_eq!(snapshot.burnable_amount(), Some(dec("1234.5")));
        assert_eq!(snapshot.seigniorage_amount(), None);
        assert_eq!(snapshot.yield_per_share(), None);
        match snapshot.policy {
            PolicyState::Contraction(m) => assert_eq!(m.outstanding_bonds, Some(Decimal::from(800))),
            other => panic!("expected contraction, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_price_at_peg_contracts() {
        let (chain, params) = setup("1", "1000", "500").await;
        let snapshot = refresh_at(&chain, &params, 10_000).await.unwrap();
        assert_eq!(snapshot.mode(), PolicyMode::Contraction);
    }

    #[tokio::test]
    async fn test_mode_fields_mutually_exclusive() {
        for price in ["0.5", "0.99", "1", "1.0001", "1.02", "1.05", "2"] {
            let (chain, params) = setup(price, "1000", "500").await;
            let snapshot = refresh_at(&chain, &params, 10_000).await.unwrap();
            if dec(price) > Decimal::ONE {
                assert_eq!(snapshot.mode(), PolicyMode::Expansion, "price {price}");
                assert!(snapshot.burnable_amount().is_none());
                assert!(snapshot.seigniorage_amount().is_some());
            } else {
                assert_eq!(snapshot.mode(), PolicyMode::Contraction, "price {price}");
                assert!(snapshot.seigniorage_amount().is_none());
                assert!(snapshot.yield_per_share().is_none());
                assert!(snapshot.burnable_amount().is_some());
            }
        }
    }

    #[tokio::test]
    async fn test_refresh_zero_stake() {
        let (chain, params) = setup("1.05", "1000", "0").await;
        let snapshot = refresh_at(&chain, &params, 10_000).await.unwrap();
        assert_eq!(snapshot.mode(), PolicyMode::Expansion);
        assert_eq!(snapshot.seigniorage_amount(), Some(Decimal::from(30)));
        assert_eq!(snapshot.yield_per_share(), None);
    }

    #[tokio::test]
    async fn test_refresh_read_failure_propagates() {
        let (chain, params) = setup("1.05", "1000", "500").await;
        chain.fail_call(TREASURY, abi::MAX_SUPPLY_EXPANSION_PERCENT);
        let result = refresh_at(&chain, &params, 10_000).await;
        assert!(matches!(result, Err(RefreshError::Read(ReaderError::Transport(_)))));
    }

    #[tokio::test]
    async fn test_optional_capabilities() {
        let chain = MockChain::new();
        let mut config = instance_config();
        config.cash_decimals = Some(18);
        config.share_decimals = Some(18);
        config.bond_decimals = Some(18);
        config.distribution_period_secs = Some(21_600);
        config.features.has_bonds = false;
        config.features.has_lp_rewards = true;
        config.features.has_stableswap = true;
        config.stableswap_quote_decimals = 6;
        config.rewards_start_block = Some(500);
        config.total_reward_amount = Some(Decimal::from(59_500));
        let params = initialize(&chain, &config).await.unwrap();

        chain.set_head(450);
        chain.set_uint(TREASURY, abi::EPOCH, U256::from(1));
        chain.set_uint(TREASURY, abi::NEXT_EPOCH_POINT, U256::from(0));
        chain.set_uint(TREASURY, "getDollarPrice()", wei("0.97"));
        chain.set_uint(TREASURY, "seigniorageSaved()", U256::ZERO);
        chain.set_uint(CASH, abi::TOTAL_SUPPLY, wei("1000"));
        chain.set_uint(BOARDROOM, abi::TOTAL_SUPPLY, wei("10"));
        chain.set_uint(STABLESWAP, abi::GET_DY, U256::from(985_000u64));

        let snapshot = refresh_at(&chain, &params, 10_000).await.unwrap();
        assert_eq!(snapshot.mode(), PolicyMode::Neutral);
        assert_eq!(snapshot.eta, EpochEta { hours: 0, minutes: 0 });
        assert_eq!(snapshot.spot_price, Some(dec("0.985")));

        let rewards = snapshot.lp_rewards.unwrap();
        assert!(!rewards.started());
        assert_eq!(rewards.blocks_until_start(), 50);
        assert_eq!(rewards.total_reward_amount, Decimal::from(59_500));
    }

    #[tokio::test]
    async fn test_config_without_features_contracts_below_peg() {
        let config = crate::config::Config::from_toml_str(
            r#"
[defaults]
rpc_url = "http://localhost:8545"

[instances.plain]
cash_decimals = 18
share_decimals = 18
distribution_period_secs = 21600

[instances.plain.contracts]
cash = "0x0000000000000000000000000000000000000c01"
share = "0x0000000000000000000000000000000000000c02"
treasury = "0x0000000000000000000000000000000000000c03"
boardroom = "0x0000000000000000000000000000000000000c04"
"#,
        )
        .unwrap();
        let instance = config.instance("plain").unwrap();
        let chain = MockChain::new();
        let params = initialize(&chain, &instance.settings).await.unwrap();
        assert_eq!(params.bond_decimals, None);

        chain.set_uint(TREASURY, abi::EPOCH, U256::from(3));
        chain.set_uint(TREASURY, abi::NEXT_EPOCH_POINT, U256::from(0));
        chain.set_uint(TREASURY, "getDollarPrice()", wei("0.92"));
        chain.set_uint(TREASURY, "seigniorageSaved()", U256::ZERO);
        chain.set_uint(TREASURY, "getBurnableDollarLeft()", wei("1234.5"));
        chain.set_uint(CASH, abi::TOTAL_SUPPLY, wei("1000"));
        chain.set_uint(BOARDROOM, abi::TOTAL_SUPPLY, wei("500"));

        let snapshot = refresh_at(&chain, &params, 10_000).await.unwrap();
        assert_eq!(snapshot.mode(), PolicyMode::Contraction);
        assert_eq!(snapshot.burnable_amount(), Some(dec("1234.5")));
        match snapshot.policy {
            PolicyState::Contraction(m) => assert_eq!(m.outstanding_bonds, None),
            other => panic!("expected contraction, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_supply_wider_than_decimal_mantissa() {
        let (chain, params) = setup("1.05", "1000", "500").await;
        // 100 billion cash tokens
        chain.set_uint(CASH, abi::TOTAL_SUPPLY, U256::from(10u64).pow(U256::from(29)));

        let snapshot = refresh_at(&chain, &params, 10_000).await.unwrap();
        assert_eq!(snapshot.total_cash_supply, Decimal::from(100_000_000_000u64));
        assert_eq!(snapshot.seigniorage_amount(), Some(Decimal::from(3_000_000_000u64)));
        assert_eq!(snapshot.yield_per_share(), Some(Decimal::from(6_000_000u64)));
    }

    #[tokio::test]
    async fn test_short_call_response_is_decode_error() {
        let (chain, params) = setup("1.05", "1000", "500").await;
        chain.set_raw(TREASURY, "getDollarPrice()", alloy::primitives::Bytes::from(vec![0u8; 8]));

        let result = refresh_at(&chain, &params, 10_000).await;
        assert!(matches!(
            result,
            Err(RefreshError::Read(ReaderError::Decode { ref method, .. })) if method == "getDollarPrice()"
        ));
    }
}
