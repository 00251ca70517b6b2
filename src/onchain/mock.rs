//! Scripted in-memory chain for tests.

use crate::onchain::abi;
use crate::onchain::reader::{
    BlockSummary, ChainReader, LogEntry, ReaderError, ReceiptSummary, TxSummary,
};

use alloy::primitives::{Address, Bytes, B256, U256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MockChain {
    head: AtomicU64,
    blocks: Mutex<HashMap<u64, BlockSummary>>,
    receipts: Mutex<HashMap<B256, ReceiptSummary>>,
    /// (contract, selector) → return data
    calls: Mutex<HashMap<(Address, [u8; 4]), Bytes>>,
    failing_blocks: Mutex<HashSet<u64>>,
    failing_calls: Mutex<HashSet<(Address, [u8; 4])>>,
    head_fails: Mutex<bool>,
    block_fetches: Mutex<Vec<u64>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn fail_head(&self, fail: bool) {
        *self.head_fails.lock().unwrap() = fail;
    }

    pub fn set_uint(&self, contract: Address, signature: &str, value: U256) {
        self.calls.lock().unwrap().insert(
            (contract, abi::selector(signature)),
            Bytes::from(value.to_be_bytes::<32>().to_vec()),
        );
    }

    pub fn set_raw(&self, contract: Address, signature: &str, data: Bytes) {
        self.calls
            .lock()
            .unwrap()
            .insert((contract, abi::selector(signature)), data);
    }

    pub fn fail_call(&self, contract: Address, signature: &str) {
        self.failing_calls
            .lock()
            .unwrap()
            .insert((contract, abi::selector(signature)));
    }

    pub fn add_block(&self, number: u64, timestamp: u64, transactions: Vec<TxSummary>) {
        self.blocks.lock().unwrap().insert(
            number,
            BlockSummary {
                number,
                timestamp,
                transactions,
            },
        );
    }

    pub fn add_receipt(&self, tx_hash: B256, success: bool, logs: Vec<LogEntry>) {
        self.receipts.lock().unwrap().insert(
            tx_hash,
            ReceiptSummary {
                tx_hash,
                success,
                logs,
            },
        );
    }

    pub fn fail_block(&self, number: u64) {
        self.failing_blocks.lock().unwrap().insert(number);
    }

    pub fn heal_block(&self, number: u64) {
        self.failing_blocks.lock().unwrap().remove(&number);
    }

    /// Block numbers requested so far, in order.
    pub fn block_fetches(&self) -> Vec<u64> {
        self.block_fetches.lock().unwrap().clone()
    }
}

impl ChainReader for MockChain {
    async fn block_number(&self) -> Result<u64, ReaderError> {
        if *self.head_fails.lock().unwrap() {
            return Err(ReaderError::Transport("head unavailable".into()));
        }
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn block(&self, number: u64) -> Result<BlockSummary, ReaderError> {
        self.block_fetches.lock().unwrap().push(number);
        if self.failing_blocks.lock().unwrap().contains(&number) {
            return Err(ReaderError::Transport(format!("block {number} timed out")));
        }
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .unwrap_or(BlockSummary {
                number,
                timestamp: 1_700_000_000 + number,
                transactions: Vec::new(),
            }))
    }

    async fn receipt(&self, hash: B256) -> Result<ReceiptSummary, ReaderError> {
        self.receipts
            .lock()
            .unwrap()
            .get(&hash)
            .cloned()
            .ok_or(ReaderError::MissingReceipt(hash))
    }

    async fn call(&self, contract: Address, calldata: Bytes) -> Result<Bytes, ReaderError> {
        let key: (Address, [u8; 4]) = (contract, calldata[..4].try_into().unwrap());
        if self.failing_calls.lock().unwrap().contains(&key) {
            return Err(ReaderError::Transport("call reverted".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ReaderError::Transport(format!("no scripted result for {contract}")))
    }
}
