//! Bridge Rewarder
//!
//! Long-running monitor that pays a one-time gas reward to addresses newly
//! observed bridging into the chain.
//!
//! # Operation
//!
//! 1. At startup, the payout contract's full event history seeds an
//!    in-memory ledger of addresses already rewarded
//! 2. The scan loop pages through new blocks looking for token mints from
//!    the zero address (bridge-in transfers)
//! 3. Recipients not present in the ledger are paid in fixed-size batches
//!    through the batch-send contract, one confirmed transaction at a time
//! 4. The block cursor advances and the loop sleeps until the next tick
//!
//! Run with the target network as the only argument:
//!
//! ```text
//! bridge-rewarder <network>
//! ```
//!
//! Networks are defined in `config.toml`; the paying key comes from the
//! `REWARD_PRIVATE_KEY` environment variable (or `.env`).

use std::sync::Arc;
use std::time::Duration;

use eyre::eyre;
use tokio::sync::RwLock;
use tracing::{error, info};

use rewarder::chain::{ChainSource, EvmChainClient};
use rewarder::config::Config;
use rewarder::server::{self, Metrics, RewarderStats};
use rewarder::watcher::RewardWatcher;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting Bridge Rewarder");

    let network = std::env::args()
        .nth(1)
        .ok_or_else(|| eyre!("usage: bridge-rewarder <network>"))?;

    let config = Config::load(&network)?;
    info!(
        network = %network,
        rpc = %config.rpc_url,
        dry_run = config.dry_run,
        batch_size = config.batch_size,
        "Configuration loaded"
    );

    let chain = EvmChainClient::new(
        &config.rpc_url,
        config.private_key.as_deref(),
        Duration::from_secs(config.receipt_timeout_secs),
    )?;

    // Fail fast if the endpoint is unreachable
    let head = chain
        .head_number()
        .await
        .map_err(|e| eyre!("cannot reach RPC endpoint {}: {}", config.rpc_url, e))?;
    info!(network = %network, head, "chain connected");

    let stats = Arc::new(RwLock::new(RewarderStats {
        rewarder_id: config.rewarder_id.clone(),
        network: network.clone(),
        ..Default::default()
    }));
    let metrics = Arc::new(Metrics::new());

    let server_stats = stats.clone();
    let server_metrics = metrics.clone();
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = server::start_server("0.0.0.0", health_port, server_stats, server_metrics).await
        {
            error!(error = %e, "health server exited");
        }
    });

    let mut watcher = RewardWatcher::new(chain, config, stats, metrics);
    watcher
        .seed_ledger()
        .await
        .map_err(|e| eyre!("ledger seeding failed: {}", e))?;

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    // Handle signals
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    // Run the watcher
    watcher.run(shutdown_rx).await?;

    info!("Bridge Rewarder stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridge_rewarder=debug,rewarder=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
