use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::api::{BasketballClient, FootballClient, LiveFeed, RugbyClient};
use crate::config::Config;
use crate::db::{
    connect_sqlite, FileMatchStore, MatchStateStore, MemoryUsageLedger, SqliteMatchStore,
    SqliteUsageLedger, UsageLedger,
};
use crate::workers::PollCycle;

/// Store and ledger backends, chosen once at startup
pub struct Backends {
    pub store: Arc<dyn MatchStateStore>,
    pub ledger: Arc<dyn UsageLedger>,
}

/// SQLite when a database URL is configured and reachable, otherwise the
/// file-backed store with a process-local ledger
pub async fn open_backends(config: &Config) -> Backends {
    if let Some(url) = config.database_url.as_deref() {
        match open_sqlite_backends(url).await {
            Ok(backends) => {
                info!("Using SQLite store and usage ledger");
                return backends;
            }
            Err(e) => {
                warn!("SQLite unavailable, falling back to file store: {:#}", e);
            }
        }
    }

    info!(
        "Using file match store at {} with in-process usage ledger",
        config.state_file.display()
    );
    Backends {
        store: Arc::new(FileMatchStore::new(&config.state_file)),
        ledger: Arc::new(MemoryUsageLedger::new()),
    }
}

async fn open_sqlite_backends(url: &str) -> Result<Backends> {
    let pool = connect_sqlite(url).await?;
    let store = SqliteMatchStore::new(pool.clone()).await?;
    let ledger = SqliteUsageLedger::new(pool).await?;

    Ok(Backends {
        store: Arc::new(store),
        ledger: Arc::new(ledger),
    })
}

/// One HTTP feed per sport
pub fn live_feeds(config: &Config) -> Result<Vec<Arc<dyn LiveFeed>>> {
    if config.api_sports_key.is_empty() {
        warn!("API_SPORTS_KEY is not set; upstream calls will be rejected");
    }

    let feeds: Vec<Arc<dyn LiveFeed>> = vec![
        Arc::new(FootballClient::new(&config.api_sports_key)?),
        Arc::new(BasketballClient::new(&config.api_sports_key)?),
        Arc::new(RugbyClient::new(&config.api_sports_key)?),
    ];

    Ok(feeds)
}

/// Wire the poll cycle from configuration
pub async fn build_poll_cycle(config: &Config) -> Result<PollCycle> {
    let feeds = live_feeds(config)?;
    let backends = open_backends(config).await;

    Ok(PollCycle::new(
        config.live.clone(),
        feeds,
        backends.store,
        backends.ledger,
    ))
}
