use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::db::usage::{gate_cutoff, Bucket, PollClaim, UsageLedger};
use crate::error::StoreResult;

const LAST_POLL_KEY: &str = "last_poll";

/// SQLite-backed usage ledger
pub struct SqliteUsageLedger {
    pool: Pool<Sqlite>,
}

impl SqliteUsageLedger {
    /// Create a ledger on an open pool and initialize the schema
    pub async fn new(pool: Pool<Sqlite>) -> Result<Self> {
        let ledger = Self { pool };
        ledger.init_schema().await?;

        info!("Usage ledger initialized");
        Ok(ledger)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_usage (
                bucket TEXT PRIMARY KEY,
                count INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create api_usage table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_state (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create poll_state table")?;

        Ok(())
    }

    async fn try_increment(&self, now: DateTime<Utc>) -> StoreResult<()> {
        let now_ms = now.timestamp_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM api_usage WHERE expires_at <= ?")
            .bind(now_ms)
            .execute(&mut *tx)
            .await?;

        for bucket in Bucket::ALL {
            sqlx::query(
                r#"
                INSERT INTO api_usage (bucket, count, expires_at) VALUES (?, 1, ?)
                ON CONFLICT(bucket) DO UPDATE SET count = api_usage.count + 1
                "#,
            )
            .bind(bucket.key(now))
            .bind((now + bucket.ttl()).timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        advance_last_poll(&mut *tx, now_ms).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn try_count(&self, bucket: Bucket, now: DateTime<Utc>) -> StoreResult<u64> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT count FROM api_usage WHERE bucket = ? AND expires_at > ?")
                .bind(bucket.key(now))
                .bind(now.timestamp_millis())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(count,)| count.max(0) as u64).unwrap_or(0))
    }

    async fn try_last_poll(&self) -> StoreResult<Option<DateTime<Utc>>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT value FROM poll_state WHERE key = ?")
            .bind(LAST_POLL_KEY)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|(ms,)| DateTime::from_timestamp_millis(ms)))
    }

    async fn try_claim(&self, now: DateTime<Utc>, min_interval: Duration) -> StoreResult<PollClaim> {
        let now_ms = now.timestamp_millis();
        let cutoff_ms = gate_cutoff(now, min_interval)
            .map(|c| c.timestamp_millis())
            .unwrap_or(i64::MIN);

        // Only needed to undo the claim; the upsert alone decides the winner
        let previous = self.try_last_poll().await?;

        // Single-statement conditional upsert: only one caller per interval
        // gets rows_affected == 1
        let result = sqlx::query(
            r#"
            INSERT INTO poll_state (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            WHERE poll_state.value <= ?
            "#,
        )
        .bind(LAST_POLL_KEY)
        .bind(now_ms)
        .bind(cutoff_ms)
        .execute(&self.pool)
        .await?;

        Ok(PollClaim {
            won: result.rows_affected() == 1,
            claimed_at: now,
            previous,
        })
    }

    async fn try_release(&self, claim: &PollClaim) -> StoreResult<()> {
        let claimed_ms = claim.claimed_at.timestamp_millis();

        match claim.previous {
            Some(previous) => {
                sqlx::query("UPDATE poll_state SET value = ? WHERE key = ? AND value = ?")
                    .bind(previous.timestamp_millis())
                    .bind(LAST_POLL_KEY)
                    .bind(claimed_ms)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                sqlx::query("DELETE FROM poll_state WHERE key = ? AND value = ?")
                    .bind(LAST_POLL_KEY)
                    .bind(claimed_ms)
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }
}

/// Move last-poll forward to `at_ms`; never rewinds a newer claim
async fn advance_last_poll(
    conn: &mut sqlx::SqliteConnection,
    at_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO poll_state (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = MAX(poll_state.value, excluded.value)
        "#,
    )
    .bind(LAST_POLL_KEY)
    .bind(at_ms)
    .execute(conn)
    .await?;

    Ok(())
}

#[async_trait]
impl UsageLedger for SqliteUsageLedger {
    async fn increment_api_usage(&self, now: DateTime<Utc>) {
        if let Err(e) = self.try_increment(now).await {
            warn!("Usage ledger unavailable, call not counted: {}", e);
        }
    }

    async fn count(&self, bucket: Bucket, now: DateTime<Utc>) -> u64 {
        self.try_count(bucket, now).await.unwrap_or_else(|e| {
            warn!("Usage ledger unavailable, treating usage as zero: {}", e);
            0
        })
    }

    async fn last_poll_time(&self) -> Option<DateTime<Utc>> {
        self.try_last_poll().await.unwrap_or_else(|e| {
            warn!("Usage ledger unavailable, no last poll time: {}", e);
            None
        })
    }

    async fn set_last_poll_time(&self, at: DateTime<Utc>) {
        let result = sqlx::query(
            r#"
            INSERT INTO poll_state (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(LAST_POLL_KEY)
        .bind(at.timestamp_millis())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!("Usage ledger unavailable, last poll time not saved: {}", e);
        }
    }

    async fn try_claim_poll(&self, now: DateTime<Utc>, min_interval: Duration) -> PollClaim {
        self.try_claim(now, min_interval).await.unwrap_or_else(|e| {
            warn!("Usage ledger unavailable, granting poll claim: {}", e);
            PollClaim {
                won: true,
                claimed_at: now,
                previous: None,
            }
        })
    }

    async fn release_poll_claim(&self, claim: &PollClaim) {
        if !claim.won {
            return;
        }

        if let Err(e) = self.try_release(claim).await {
            warn!("Usage ledger unavailable, poll claim not released: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_sqlite;
    use crate::db::usage::UsageSnapshot;
    use chrono::TimeZone;

    async fn open(dir: &tempfile::TempDir) -> SqliteUsageLedger {
        let url = format!("sqlite:{}", dir.path().join("usage.db").display());
        let pool = connect_sqlite(&url).await.unwrap();
        SqliteUsageLedger::new(pool).await.unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 13, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_increment_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open(&dir).await;

        for _ in 0..3 {
            ledger.increment_api_usage(now()).await;
        }

        assert_eq!(
            ledger.usage_snapshot(now()).await,
            UsageSnapshot {
                hourly: 3,
                daily: 3,
                monthly: 3
            }
        );
        assert_eq!(ledger.last_poll_time().await, Some(now()));

        let next_day = now() + chrono::Duration::days(1);
        assert_eq!(ledger.daily_count(next_day).await, 0);
        assert_eq!(ledger.monthly_count(next_day).await, 3);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_within_interval() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open(&dir).await;
        let interval = Duration::from_secs(60);

        let first = ledger.try_claim_poll(now(), interval).await;
        let second = ledger
            .try_claim_poll(now() + chrono::Duration::seconds(1), interval)
            .await;

        assert!(first.won);
        assert!(!second.won);
        assert_eq!(second.previous, Some(now()));

        let third = ledger
            .try_claim_poll(now() + chrono::Duration::seconds(61), interval)
            .await;
        assert!(third.won);
    }

    #[tokio::test]
    async fn test_release_rolls_back_claim() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open(&dir).await;

        let claim = ledger.try_claim_poll(now(), Duration::from_secs(60)).await;
        assert!(claim.won);

        ledger.release_poll_claim(&claim).await;
        assert_eq!(ledger.last_poll_time().await, None);

        // Gate is open again immediately
        let retry = ledger
            .try_claim_poll(now() + chrono::Duration::seconds(1), Duration::from_secs(60))
            .await;
        assert!(retry.won);
    }

    #[tokio::test]
    async fn test_slow_tick_does_not_rewind_gate() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open(&dir).await;
        let interval = Duration::from_secs(60);

        let a = ledger.try_claim_poll(now(), interval).await;
        let b = ledger
            .try_claim_poll(now() + chrono::Duration::seconds(61), interval)
            .await;
        assert!(a.won && b.won);

        // A finishes after B claimed; its stamp must not move the gate back
        ledger.increment_api_usage(now()).await;
        assert_eq!(
            ledger.last_poll_time().await,
            Some(now() + chrono::Duration::seconds(61))
        );

        let c = ledger
            .try_claim_poll(now() + chrono::Duration::seconds(62), interval)
            .await;
        assert!(!c.won);
        assert_eq!(ledger.monthly_count(now()).await, 1);
    }

    #[tokio::test]
    async fn test_set_last_poll_time_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open(&dir).await;
        let later = now() + chrono::Duration::minutes(5);

        ledger.set_last_poll_time(later).await;
        ledger.set_last_poll_time(now()).await;
        assert_eq!(ledger.last_poll_time().await, Some(now()));
    }

    #[tokio::test]
    async fn test_fails_open_when_pool_closed() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open(&dir).await;
        ledger.pool.close().await;

        assert_eq!(ledger.monthly_count(now()).await, 0);
        assert_eq!(ledger.last_poll_time().await, None);
        assert!(ledger.try_claim_poll(now(), Duration::from_secs(60)).await.won);
        ledger.increment_api_usage(now()).await;
    }
}
