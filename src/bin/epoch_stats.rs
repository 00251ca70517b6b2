//! One-shot epoch summary for a configured instance.
//!
//! Usage: epoch-stats [--config <path>] <instance>

use seigniorage_watch::cli::{self, CliArgs};
use seigniorage_watch::config::Config;
use seigniorage_watch::epoch;
use seigniorage_watch::notify::render;
use seigniorage_watch::onchain::RpcChainReader;
use seigniorage_watch::protocol;

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let _ = dotenvy::dotenv();

    let args = CliArgs::parse(std::env::args())?;
    let config = Config::load(&args.config_path)
        .with_context(|| format!("loading {}", args.config_path.display()))?;
    cli::init_logging(&config.logging);

    let instance = config.instance(&args.instance)?;
    let reader = RpcChainReader::connect(&instance.runtime.rpc_url)
        .await
        .context("connecting to RPC endpoint")?;
    let params = protocol::initialize(&reader, &instance.settings)
        .await
        .context("initializing protocol parameters")?;

    let snapshot = epoch::refresh(&reader, &params)
        .await
        .context("reading epoch state")?;

    let display = &instance.settings.display;
    println!("{}", render::nickname(&snapshot));
    println!("{}", render::presence(&snapshot, display));
    println!();
    println!("{}", render::stats(&snapshot, display));

    Ok(())
}
