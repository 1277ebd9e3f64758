use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

/// Hour buckets are kept for 2 hours
pub const HOUR_BUCKET_TTL_SECS: i64 = 2 * 60 * 60;
/// Day buckets are kept for 2 days
pub const DAY_BUCKET_TTL_SECS: i64 = 2 * 24 * 60 * 60;
/// Month buckets are kept for ~13 months so rollover never loses a month mid-query
pub const MONTH_BUCKET_TTL_SECS: i64 = 395 * 24 * 60 * 60;

/// Counters for the buckets containing a given instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub hourly: u64,
    pub daily: u64,
    pub monthly: u64,
}

/// Result of an attempt to take the poll gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollClaim {
    /// Whether this caller won the gate
    pub won: bool,
    /// Timestamp written by this claim
    pub claimed_at: DateTime<Utc>,
    /// Last-poll value seen before the claim
    pub previous: Option<DateTime<Utc>>,
}

/// Bucket granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Hour,
    Day,
    Month,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Hour, Bucket::Day, Bucket::Month];

    /// Storage key of the bucket containing `at`
    pub fn key(&self, at: DateTime<Utc>) -> String {
        match self {
            Bucket::Hour => at.format("usage:hour:%Y-%m-%dT%H").to_string(),
            Bucket::Day => at.format("usage:day:%Y-%m-%d").to_string(),
            Bucket::Month => at.format("usage:month:%Y-%m").to_string(),
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(match self {
            Bucket::Hour => HOUR_BUCKET_TTL_SECS,
            Bucket::Day => DAY_BUCKET_TTL_SECS,
            Bucket::Month => MONTH_BUCKET_TTL_SECS,
        })
    }
}

/// Latest last-poll value that still lets a new tick through
pub fn gate_cutoff(now: DateTime<Utc>, min_interval: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(min_interval)
        .ok()
        .and_then(|interval| now.checked_sub_signed(interval))
}

/// Metered API call counters plus the last-poll timestamp that gates ticks
///
/// Implementations fail open: backend errors are logged and read as zero
/// usage or no previous poll, so a broken ledger never halts polling.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Count one API call in every bucket containing `now` and advance
    /// last-poll to `now` unless a newer claim already moved it further
    async fn increment_api_usage(&self, now: DateTime<Utc>);

    async fn count(&self, bucket: Bucket, now: DateTime<Utc>) -> u64;

    async fn hourly_count(&self, now: DateTime<Utc>) -> u64 {
        self.count(Bucket::Hour, now).await
    }

    async fn daily_count(&self, now: DateTime<Utc>) -> u64 {
        self.count(Bucket::Day, now).await
    }

    async fn monthly_count(&self, now: DateTime<Utc>) -> u64 {
        self.count(Bucket::Month, now).await
    }

    async fn usage_snapshot(&self, now: DateTime<Utc>) -> UsageSnapshot {
        UsageSnapshot {
            hourly: self.hourly_count(now).await,
            daily: self.daily_count(now).await,
            monthly: self.monthly_count(now).await,
        }
    }

    async fn last_poll_time(&self) -> Option<DateTime<Utc>>;

    async fn set_last_poll_time(&self, at: DateTime<Utc>);

    /// Atomically set last-poll to `now` if absent or at least `min_interval` old
    async fn try_claim_poll(&self, now: DateTime<Utc>, min_interval: Duration) -> PollClaim;

    /// Undo a won claim, unless another writer has moved last-poll since
    async fn release_poll_claim(&self, claim: &PollClaim);
}

#[derive(Debug, Default)]
struct MemoryLedgerState {
    counters: HashMap<String, (u64, DateTime<Utc>)>,
    last_poll: Option<DateTime<Utc>>,
}

/// Process-local ledger, used when no database is configured
#[derive(Debug, Default)]
pub struct MemoryUsageLedger {
    state: Mutex<MemoryLedgerState>,
}

impl MemoryUsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a bucket's counter directly
    pub async fn seed(&self, bucket: Bucket, at: DateTime<Utc>, count: u64) {
        let mut state = self.state.lock().await;
        state
            .counters
            .insert(bucket.key(at), (count, at + bucket.ttl()));
    }
}

#[async_trait]
impl UsageLedger for MemoryUsageLedger {
    async fn increment_api_usage(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state.counters.retain(|_, (_, expires_at)| *expires_at > now);

        for bucket in Bucket::ALL {
            let entry = state
                .counters
                .entry(bucket.key(now))
                .or_insert((0, now + bucket.ttl()));
            entry.0 += 1;
        }
        state.last_poll = state.last_poll.max(Some(now));
    }

    async fn count(&self, bucket: Bucket, now: DateTime<Utc>) -> u64 {
        let state = self.state.lock().await;
        state
            .counters
            .get(&bucket.key(now))
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(count, _)| *count)
            .unwrap_or(0)
    }

    async fn last_poll_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_poll
    }

    async fn set_last_poll_time(&self, at: DateTime<Utc>) {
        self.state.lock().await.last_poll = Some(at);
    }

    async fn try_claim_poll(&self, now: DateTime<Utc>, min_interval: Duration) -> PollClaim {
        let mut state = self.state.lock().await;
        let previous = state.last_poll;

        let won = match previous {
            None => true,
            Some(last) => gate_cutoff(now, min_interval).is_some_and(|cutoff| last <= cutoff),
        };

        if won {
            state.last_poll = Some(now);
        }

        PollClaim {
            won,
            claimed_at: now,
            previous,
        }
    }

    async fn release_poll_claim(&self, claim: &PollClaim) {
        if !claim.won {
            return;
        }

        let mut state = self.state.lock().await;
        if state.last_poll == Some(claim.claimed_at) {
            state.last_poll = claim.previous;
        }
    }
}
