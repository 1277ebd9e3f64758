use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::admission::admit;
use crate::api::normalize::normalize;
use crate::api::{LiveFeed, RawFixture};
use crate::budget::{usage_tier, UsageTier};
use crate::config::LiveConfig;
use crate::db::{MatchStateStore, UsageLedger, UsageSnapshot};
use crate::error::PollError;
use crate::logging::log_outcome;
use crate::models::{LiveMatchState, Sport};
use crate::workers::diff::diff_snapshot;

/// Why a tick did no work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    KillSwitch,
    BudgetExhausted { monthly_used: u64, budget: u64 },
    IntervalNotElapsed { tier: UsageTier, interval: Duration },
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::KillSwitch => "kill_switch",
            SkipReason::BudgetExhausted { .. } => "budget_exhausted",
            SkipReason::IntervalNotElapsed { .. } => "interval_not_elapsed",
        }
    }
}

/// Counts for a completed tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollSummary {
    pub tier: UsageTier,
    /// Usage after this tick's calls were counted
    pub usage: UsageSnapshot,
    pub api_calls: usize,
    /// Sports whose feed errored this tick
    pub failed_feeds: Vec<Sport>,
    pub fetched: usize,
    pub admitted: usize,
    pub updated: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Skipped(SkipReason),
    Completed(PollSummary),
    Failed(String),
}

impl PollOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, PollOutcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PollOutcome::Failed(_))
    }

    pub fn summary(&self) -> Option<&PollSummary> {
        match self {
            PollOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Warn on the first failed tick, then on every this many in a row
const FAILURE_WARN_EVERY: u32 = 10;

/// Failed ticks since the last completed one
#[derive(Debug, Default)]
struct FailureStreak {
    ticks: u32,
    /// Upstream calls made by failed ticks; the ledger never sees them
    uncounted_calls: usize,
}

impl FailureStreak {
    /// Record a failed tick, returning whether it should be reported
    fn record(&mut self, calls: usize) -> bool {
        self.ticks += 1;
        self.uncounted_calls += calls;
        self.ticks == 1 || self.ticks % FAILURE_WARN_EVERY == 0
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Feed results for one tick, before admission
struct FetchedBatch {
    api_calls: usize,
    failed_feeds: Vec<Sport>,
    fetched: usize,
    by_sport: BTreeMap<Sport, Vec<LiveMatchState>>,
}

/// The poll cycle orchestrator; the only writer of the store and ledger
///
/// A tick walks kill switch, budget tier, interval gate, fetch, normalize,
/// admit, diff and persist, and can stop at any gate. The interval gate is an
/// atomic claim on the ledger's last-poll time, so concurrent triggers spend
/// the budget at most once per interval.
pub struct PollCycle {
    config: LiveConfig,
    feeds: Vec<Arc<dyn LiveFeed>>,
    store: Arc<dyn MatchStateStore>,
    ledger: Arc<dyn UsageLedger>,
    /// Serializes ticks within this process
    tick_state: Mutex<FailureStreak>,
}

impl PollCycle {
    pub fn new(
        config: LiveConfig,
        feeds: Vec<Arc<dyn LiveFeed>>,
        store: Arc<dyn MatchStateStore>,
        ledger: Arc<dyn UsageLedger>,
    ) -> Self {
        Self {
            config,
            feeds,
            store,
            ledger,
            tick_state: Mutex::new(FailureStreak::default()),
        }
    }

    /// Run one tick now
    pub async fn run(&self) -> PollOutcome {
        self.run_at(Utc::now()).await
    }

    /// Run one tick as of `now`
    pub async fn run_at(&self, now: DateTime<Utc>) -> PollOutcome {
        let mut streak = self.tick_state.lock().await;

        let outcome = self.tick(now, &mut streak).await;
        log_outcome(&outcome);
        outcome
    }

    async fn tick(&self, now: DateTime<Utc>, streak: &mut FailureStreak) -> PollOutcome {
        if self.config.kill_switch {
            return PollOutcome::Skipped(SkipReason::KillSwitch);
        }

        let monthly_used = self.ledger.monthly_count(now).await;
        let tier = usage_tier(monthly_used, self.config.monthly_budget);

        let interval = match self.config.poll_interval(self.config.primary_sport, tier) {
            Some(interval) => interval,
            None => {
                return PollOutcome::Skipped(SkipReason::BudgetExhausted {
                    monthly_used,
                    budget: self.config.monthly_budget,
                })
            }
        };

        let claim = self.ledger.try_claim_poll(now, interval).await;
        if !claim.won {
            return PollOutcome::Skipped(SkipReason::IntervalNotElapsed { tier, interval });
        }

        let batch = self.fetch_all(now).await;
        let api_calls = batch.api_calls;

        match self.publish(now, tier, batch).await {
            Ok(summary) => {
                streak.reset();
                PollOutcome::Completed(summary)
            }
            Err(e) => {
                // Give the gate back so the next trigger retries on schedule
                self.ledger.release_poll_claim(&claim).await;

                if streak.record(api_calls) {
                    warn!(
                        failed_ticks = streak.ticks,
                        uncounted_calls = streak.uncounted_calls,
                        "Poll ticks keep failing; their upstream calls are not counted against the budget"
                    );
                }
                PollOutcome::Failed(e.to_string())
            }
        }
    }

    /// Call every feed concurrently; a failed feed contributes no matches
    async fn fetch_all(&self, now: DateTime<Utc>) -> FetchedBatch {
        let results = join_all(self.feeds.iter().map(|feed| fetch_feed(feed.as_ref(), now))).await;

        let mut batch = FetchedBatch {
            api_calls: 0,
            failed_feeds: Vec::new(),
            fetched: 0,
            by_sport: BTreeMap::new(),
        };

        for (sport, calls, result) in results {
            // Calls were spent whether or not the feed returned anything
            batch.api_calls += calls;

            let raws = match result {
                Ok(raws) => raws,
                Err(e) => {
                    warn!(sport = %sport, "Live feed failed, treating as no live matches: {:#}", e);
                    batch.failed_feeds.push(sport);
                    Vec::new()
                }
            };

            batch.fetched += raws.len();
            batch
                .by_sport
                .entry(sport)
                .or_default()
                .extend(normalize(sport, raws, now));
        }

        batch
    }

    async fn publish(
        &self,
        now: DateTime<Utc>,
        tier: UsageTier,
        batch: FetchedBatch,
    ) -> Result<PollSummary, PollError> {
        let mut admitted = Vec::new();
        for (sport, states) in batch.by_sport {
            let max_live = self.config.settings(sport).max_live;
            admitted.extend(admit(sport, states, &self.config.leagues, max_live));
        }
        let admitted_count = admitted.len();

        let current = self.store.get_all_matches().await?;
        let diff = diff_snapshot(&current, admitted);

        debug!(
            backend = self.store.backend(),
            upserts = diff.upserts.len(),
            removals = diff.removals.len(),
            unchanged = diff.unchanged,
            "Snapshot diff"
        );

        self.store.set_matches(&diff.upserts).await?;
        self.store.remove_matches(&diff.removals).await?;

        for _ in 0..batch.api_calls {
            self.ledger.increment_api_usage(now).await;
        }
        let usage = self.ledger.usage_snapshot(now).await;

        Ok(PollSummary {
            tier,
            usage,
            api_calls: batch.api_calls,
            failed_feeds: batch.failed_feeds,
            fetched: batch.fetched,
            admitted: admitted_count,
            updated: diff.upserts.len(),
            removed: diff.removals.len(),
        })
    }
}

async fn fetch_feed(
    feed: &dyn LiveFeed,
    now: DateTime<Utc>,
) -> (Sport, usize, Result<Vec<RawFixture>>) {
    (feed.sport(), feed.planned_calls(now), feed.fetch_live(now).await)
}
