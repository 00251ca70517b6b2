//! Incremental block range scanner.
//!
//! Walks the chain forward from a monotonic cursor in bounded ranges, looking
//! for policy-execution calls (`allocateSeigniorage()` by default) to the
//! treasury. Each successful call becomes exactly one `PolicyEvent`:
//! `SeigniorageDistributed` if the receipt carries the distribution event,
//! `NoOpEpoch` if it doesn't. Blocks are walked instead of filtering logs
//! because a log filter can't see the epochs that distributed nothing.
//!
//! The cursor only moves after the whole range has been classified and a
//! snapshot taken for every event, so a failure anywhere in the range leaves
//! it untouched and the next step retries the same range from scratch.

use crate::epoch::{self, EpochSnapshot, RefreshError};
use crate::onchain::reader::{ChainReader, ReaderError, TxSummary};
use crate::onchain::{abi, units};
use crate::protocol::ProtocolParameters;

use alloy::primitives::B256;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Read(#[from] ReaderError),
    #[error("snapshot refresh failed: {0}")]
    Refresh(#[from] RefreshError),
}

/// Last block fully processed. Ranges are half-open: `[last_scanned_block, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    last_scanned_block: u64,
}

impl ScanCursor {
    pub fn new(start_block: u64) -> Self {
        Self {
            last_scanned_block: start_block,
        }
    }

    pub fn last_scanned_block(&self) -> u64 {
        self.last_scanned_block
    }

    fn commit(&mut self, to: u64) {
        self.last_scanned_block = self.last_scanned_block.max(to);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyEventKind {
    SeigniorageDistributed { seigniorage: Decimal },
    /// The epoch advanced but nothing was distributed.
    NoOpEpoch,
}

/// One on-chain policy execution.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyEvent {
    pub block_number: u64,
    /// Block timestamp, unix seconds.
    pub timestamp: u64,
    pub tx_hash: B256,
    pub kind: PolicyEventKind,
}

impl PolicyEvent {
    pub fn seigniorage_amount(&self) -> Option<Decimal> {
        match self.kind {
            PolicyEventKind::SeigniorageDistributed { seigniorage } => Some(seigniorage),
            PolicyEventKind::NoOpEpoch => None,
        }
    }
}

impl std::fmt::Display for PolicyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            PolicyEventKind::SeigniorageDistributed { seigniorage } => write!(
                f,
                "SeigniorageDistributed(block={}, amount={})",
                self.block_number, seigniorage
            ),
            PolicyEventKind::NoOpEpoch => write!(f, "NoOpEpoch(block={})", self.block_number),
        }
    }
}

/// An event paired with the snapshot taken right after it was found.
#[derive(Debug, Clone)]
pub struct DetectedEvent {
    pub event: PolicyEvent,
    pub snapshot: Arc<EpochSnapshot>,
}

pub struct BlockRangeScanner {
    max_range_size: u64,
}

impl BlockRangeScanner {
    pub fn new(max_range_size: u64) -> Self {
        Self {
            max_range_size: max_range_size.max(1),
        }
    }

    pub fn max_range_size(&self) -> u64 {
        self.max_range_size
    }

    /// Advance `cursor` over at most `max_range_size` new blocks.
    ///
    /// Returns every policy execution found in the range with a fresh
    /// snapshot each. On error the cursor is left where it was.
    pub async fn scan_step<R: ChainReader>(
        &self,
        reader: &R,
        cursor: &mut ScanCursor,
        params: &ProtocolParameters,
    ) -> Result<Vec<DetectedEvent>, ScanError> {
        let head = reader.block_number().await?;
        let from = cursor.last_scanned_block();
        if head <= from {
            return Ok(Vec::new());
        }
        let to = from.saturating_add(self.max_range_size).min(head);

        debug!(from = from, to = to, head = head, "scanning block range");

        let events = self.scan_range(reader, from, to, params).await?;

        let mut detected = Vec::with_capacity(events.len());
        for event in events {
            let snapshot = epoch::refresh(reader, params).await?;
            detected.push(DetectedEvent {
                event,
                snapshot: Arc::new(snapshot),
            });
        }

        cursor.commit(to);

        if !detected.is_empty() {
            info!(
                from = from,
                to = to,
                events = detected.len(),
                "policy executions found in range"
            );
        }

        Ok(detected)
    }

    /// Classify every matching transaction in `[from, to)`.
    async fn scan_range<R: ChainReader>(
        &self,
        reader: &R,
        from: u64,
        to: u64,
        params: &ProtocolParameters,
    ) -> Result<Vec<PolicyEvent>, ReaderError> {
        let mut events = Vec::new();

        for number in from..to {
            let block = reader.block(number).await?;
            for tx in block.transactions.iter().filter(|tx| is_policy_execution(tx, params)) {
                if let Some(event) = classify(reader, tx, block.number, block.timestamp, params).await? {
                    events.push(event);
                }
            }
        }

        Ok(events)
    }
}

fn is_policy_execution(tx: &TxSummary, params: &ProtocolParameters) -> bool {
    let deployment = &params.deployment;
    tx.to == Some(deployment.contracts.treasury)
        && abi::calls_selector(&tx.input, &deployment.methods.policy_execution_selector)
}

/// Turn one matching transaction into an event. Reverted calls never ran
/// and produce nothing.
async fn classify<R: ChainReader>(
    reader: &R,
    tx: &TxSummary,
    block_number: u64,
    timestamp: u64,
    params: &ProtocolParameters,
) -> Result<Option<PolicyEvent>, ReaderError> {
    let receipt = reader.receipt(tx.hash).await?;
    if !receipt.success {
        debug!(tx = %tx.hash, block = block_number, "policy execution reverted, skipping");
        return Ok(None);
    }

    let deployment = &params.deployment;
    let decoded = reader.decode_event(
        &receipt,
        deployment.contracts.treasury,
        deployment.methods.distribution_topic,
    );

    // (uint256 timestamp, uint256 seigniorage)
    let seigniorage = decoded
        .as_ref()
        .and_then(|event| event.words.get(1).copied())
        .map(|raw| units::to_decimal(raw, params.cash_decimals));

    let kind = match seigniorage {
        Some(Ok(seigniorage)) => PolicyEventKind::SeigniorageDistributed { seigniorage },
        Some(Err(e)) => {
            warn!(tx = %tx.hash, error = %e, "undecodable distribution amount, treating as no-op epoch");
            PolicyEventKind::NoOpEpoch
        }
        None => PolicyEventKind::NoOpEpoch,
    };

    let event = PolicyEvent {
        block_number,
        timestamp,
        tx_hash: tx.hash,
        kind,
    };
    info!(event = %event, tx = %tx.hash, "policy execution detected");

    Ok(Some(event))
}
