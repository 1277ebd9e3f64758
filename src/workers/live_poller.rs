use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use crate::workers::PollCycle;

/// Worker that triggers the poll cycle on a fixed cadence
///
/// The cadence only needs to be finer than the shortest poll interval: the
/// cycle's own gate decides whether a trigger does any work.
pub struct LivePollerWorker {
    cycle: Arc<PollCycle>,
    tick_interval: Duration,
}

impl LivePollerWorker {
    /// Create a new live poller worker
    pub fn new(cycle: Arc<PollCycle>, tick_interval_secs: u64) -> Self {
        Self {
            cycle,
            tick_interval: Duration::from_secs(tick_interval_secs.max(1)),
        }
    }

    /// Run the worker loop
    pub async fn run(&self) {
        info!("Live poller started (tick interval: {:?})", self.tick_interval);

        let mut interval = time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // First tick fires immediately
            interval.tick().await;
            self.cycle.run().await;
        }
    }
}
