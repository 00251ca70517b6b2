//! On-chain access for the monitored stablecoin deployment.
//!
//! Architecture:
//! - `ChainReader`: the read-only seam every other module talks to
//! - `RpcChainReader`: alloy HTTP provider implementation
//! - `abi`: selectors/topics computed from signature strings, word codec
//! - `units`: raw base-unit integers ↔ fixed-scale `Decimal`

pub mod abi;
#[cfg(test)]
pub mod mock;
pub mod reader;
pub mod rpc;
pub mod units;

pub use reader::{ChainReader, ReaderError};
pub use rpc::RpcChainReader;
