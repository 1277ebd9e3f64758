use anyhow::Result;
use tracing::info;

use live_scores::bootstrap::build_poll_cycle;
use live_scores::config::Config;
use live_scores::logging::init_tracing;
use live_scores::workers::PollOutcome;

// Single tick for cron-style triggers; skipped ticks exit zero
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("poll_once=info,live_scores=info,warn");

    let config = Config::from_env()?;
    let cycle = build_poll_cycle(&config).await?;

    match cycle.run().await {
        PollOutcome::Failed(message) => anyhow::bail!("Poll tick failed: {}", message),
        PollOutcome::Skipped(reason) => {
            info!("Tick skipped: {}", reason.as_str());
        }
        PollOutcome::Completed(summary) => {
            println!("{}", serde_json::to_string(&summary)?);
        }
    }

    Ok(())
}
