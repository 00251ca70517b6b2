//! Monitor for algorithmic-stablecoin deployments.
//!
//! Tracks epoch economics (expansion/contraction, seigniorage, boardroom
//! yield) and watches the treasury for policy executions, handing each one
//! to a notification sink.

pub mod cli;
pub mod config;
pub mod epoch;
pub mod monitor;
pub mod notify;
pub mod onchain;
pub mod protocol;
pub mod scanner;
