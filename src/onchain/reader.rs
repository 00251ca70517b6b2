//! The chain-reader seam.
//!
//! Everything the monitor knows about the chain comes through `ChainReader`:
//! point-in-time contract calls plus block/receipt lookups. The production
//! implementation is `RpcChainReader`; tests script a `MockChain`.

use crate::onchain::abi;
use crate::onchain::units::{self, UnitsError};

use alloy::primitives::{Address, Bytes, B256, U256};
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("block {0} not available from node")]
    MissingBlock(u64),
    #[error("receipt for {0} not available from node")]
    MissingReceipt(B256),
    #[error("unexpected response from {method}: {reason}")]
    Decode { method: String, reason: String },
    #[error(transparent)]
    Units(#[from] UnitsError),
}

/// A transaction as seen by the scanner: only what's needed to match it.
#[derive(Debug, Clone)]
pub struct TxSummary {
    pub hash: B256,
    pub to: Option<Address>,
    pub input: Bytes,
}

/// A block with its full transaction list.
#[derive(Debug, Clone)]
pub struct BlockSummary {
    pub number: u64,
    pub timestamp: u64,
    pub transactions: Vec<TxSummary>,
}

/// A single log emitted in a receipt.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct ReceiptSummary {
    pub tx_hash: B256,
    /// False when the transaction reverted.
    pub success: bool,
    pub logs: Vec<LogEntry>,
}

/// An event log that matched an emitter + topic0, with its data split into words.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub address: Address,
    pub topics: Vec<B256>,
    pub words: Vec<U256>,
}

/// Read access to a single chain. Every call may fail transiently.
pub trait ChainReader: Send + Sync {
    /// Current chain head.
    fn block_number(&self) -> impl Future<Output = Result<u64, ReaderError>> + Send;

    /// Block `number` with full transactions.
    fn block(&self, number: u64) -> impl Future<Output = Result<BlockSummary, ReaderError>> + Send;

    fn receipt(&self, hash: B256) -> impl Future<Output = Result<ReceiptSummary, ReaderError>> + Send;

    /// `eth_call` against the latest block.
    fn call(
        &self,
        contract: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<Bytes, ReaderError>> + Send;

    /// Find the first log in `receipt` emitted by `emitter` with topic0 `event_topic`.
    /// A non-word-aligned payload does not match.
    fn decode_event(
        &self,
        receipt: &ReceiptSummary,
        emitter: Address,
        event_topic: B256,
    ) -> Option<DecodedEvent> {
        receipt
            .logs
            .iter()
            .filter(|log| log.address == emitter && log.topics.first() == Some(&event_topic))
            .find_map(|log| {
                abi::words(&log.data).map(|words| DecodedEvent {
                    address: log.address,
                    topics: log.topics.clone(),
                    words,
                })
            })
    }
}

/// Call a method returning a single `uint256`.
pub async fn call_uint<R: ChainReader>(
    reader: &R,
    contract: Address,
    signature: &str,
    args: &[U256],
) -> Result<U256, ReaderError> {
    let output = reader.call(contract, abi::encode_call(signature, args)).await?;
    abi::word(&output, 0).ok_or_else(|| ReaderError::Decode {
        method: signature.to_string(),
        reason: format!("expected at least 32 bytes, got {}", output.len()),
    })
}

/// Call a method returning a `uint256` and narrow it to `u64`.
pub async fn call_u64<R: ChainReader>(
    reader: &R,
    contract: Address,
    signature: &str,
) -> Result<u64, ReaderError> {
    let raw = call_uint(reader, contract, signature, &[]).await?;
    Ok(units::to_u64(raw)?)
}
