use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use live_scores::bootstrap::build_poll_cycle;
use live_scores::config::Config;
use live_scores::logging::init_tracing;
use live_scores::workers::LivePollerWorker;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("live_scores=info,warn");

    info!("Starting live-scores");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded (budget: {} calls/month, kill switch: {})",
        config.live.monthly_budget, config.live.kill_switch
    );

    let cycle = Arc::new(build_poll_cycle(&config).await?);
    let poller = LivePollerWorker::new(Arc::clone(&cycle), config.tick_interval);

    let poller_handle = tokio::spawn(async move {
        poller.run().await;
    });

    info!("Live poller running");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = poller_handle => {
            error!("Live poller exited unexpectedly: {:?}", result);
        }
    }

    info!("Shutting down live-scores");
    Ok(())
}
