//! JSON-RPC backed `ChainReader` over an alloy HTTP provider.

use crate::onchain::reader::{
    BlockSummary, ChainReader, LogEntry, ReaderError, ReceiptSummary, TxSummary,
};

use alloy::consensus::Transaction as _;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, TransactionRequest};
use tracing::{debug, info};

fn transport<E: std::fmt::Display>(e: E) -> ReaderError {
    ReaderError::Transport(e.to_string())
}

/// Chain reader talking to a single RPC endpoint.
#[derive(Clone)]
pub struct RpcChainReader {
    provider: DynProvider,
}

impl RpcChainReader {
    /// Connect to `url` and verify the endpoint answers with a chain id.
    pub async fn connect(url: &str) -> Result<Self, ReaderError> {
        let provider = ProviderBuilder::new().connect(url).await.map_err(transport)?;
        let chain_id = provider.get_chain_id().await.map_err(transport)?;
        info!(url = %url, chain_id = chain_id, "connected to chain RPC");

        Ok(Self {
            provider: provider.erased(),
        })
    }
}

impl ChainReader for RpcChainReader {
    async fn block_number(&self) -> Result<u64, ReaderError> {
        self.provider.get_block_number().await.map_err(transport)
    }

    async fn block(&self, number: u64) -> Result<BlockSummary, ReaderError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await
            .map_err(transport)?
            .ok_or(ReaderError::MissingBlock(number))?;

        let transactions: Vec<TxSummary> = block
            .transactions
            .txns()
            .map(|tx| TxSummary {
                hash: *tx.inner.tx_hash(),
                to: tx.to(),
                input: tx.input().clone(),
            })
            .collect();

        debug!(block = number, txs = transactions.len(), "fetched block");

        Ok(BlockSummary {
            number,
            timestamp: block.header.timestamp,
            transactions,
        })
    }

    async fn receipt(&self, hash: B256) -> Result<ReceiptSummary, ReaderError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(transport)?
            .ok_or(ReaderError::MissingReceipt(hash))?;

        let logs = receipt
            .inner
            .logs()
            .iter()
            .map(|log| LogEntry {
                address: log.address(),
                topics: log.topics().to_vec(),
                data: log.data().data.clone(),
            })
            .collect();

        Ok(ReceiptSummary {
            tx_hash: hash,
            success: receipt.inner.status(),
            logs,
        })
    }

    async fn call(&self, contract: Address, calldata: Bytes) -> Result<Bytes, ReaderError> {
        let tx = TransactionRequest::default().to(contract).input(calldata.into());
        self.provider.call(tx).await.map_err(transport)
    }
}
