use seigniorage_watch::cli::{self, CliArgs};
use seigniorage_watch::config::Config;
use seigniorage_watch::monitor::EpochMonitor;
use seigniorage_watch::notify::{render, LogSink, NotificationSink, WebhookSink};
use seigniorage_watch::onchain::RpcChainReader;
use seigniorage_watch::protocol;

use anyhow::Context;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage (RPC + webhook).
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    // Load .env if present
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse(std::env::args())?;
    let config = Config::load(&args.config_path)
        .with_context(|| format!("loading {}", args.config_path.display()))?;

    cli::init_logging(&config.logging);

    info!("seigniorage-watch v{} starting", env!("CARGO_PKG_VERSION"));

    let instance = config.instance(&args.instance)?;
    info!(
        instance = %instance.name,
        rpc = %instance.runtime.rpc_url,
        features = ?instance.settings.features,
        "instance resolved"
    );

    let reader = RpcChainReader::connect(&instance.runtime.rpc_url)
        .await
        .context("connecting to RPC endpoint")?;

    let params = match protocol::initialize(&reader, &instance.settings).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, instance = %instance.name, "protocol parameter initialization failed");
            return Err(e).context("initializing protocol parameters");
        }
    };

    // --- Sinks ---
    let mut sinks: Vec<Box<dyn NotificationSink>> = vec![Box::new(LogSink)];
    if let Some(url) = &instance.settings.notify.webhook_url {
        sinks.push(Box::new(WebhookSink::new(url.clone(), instance.settings.display.clone())?));
        info!("webhook notifications enabled");
    } else {
        warn!("no webhook configured - events are logged only");
    }

    let monitor = EpochMonitor::new(Arc::new(reader), Arc::new(params), sinks, &instance.runtime);

    // Status line for operators, one per published snapshot.
    let mut snapshots = monitor.subscribe();
    let display_cfg = instance.settings.display.clone();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let latest = snapshots.borrow_and_update().clone();
            if let Some(s) = latest {
                info!(
                    status = %render::nickname(&s),
                    presence = %render::presence(&s, &display_cfg),
                    "epoch status"
                );
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Dropping the sender would stop the monitor; keep it alive instead.
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutting down...");
        let _ = shutdown_tx.send(true);
    });

    monitor.run(shutdown_rx).await;

    Ok(())
}
