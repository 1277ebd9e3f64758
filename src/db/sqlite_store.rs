use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

use crate::db::MatchStateStore;
use crate::error::{StoreError, StoreResult};
use crate::models::LiveMatchState;

/// Rows outlive explicit removal by at most this long
const DEFAULT_TTL_HOURS: i64 = 24;

/// SQLite-backed match store
///
/// One row per fixture plus an index table of live fixture IDs, so listing
/// live matches never scans dead rows. Every row carries an expiry as a
/// safety net for fixtures that are never explicitly removed.
pub struct SqliteMatchStore {
    pool: Pool<Sqlite>,
    ttl: Duration,
}

impl SqliteMatchStore {
    /// Create a match store on an open pool and initialize the schema
    pub async fn new(pool: Pool<Sqlite>) -> Result<Self> {
        let store = Self {
            pool,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        };
        store.init_schema().await?;

        info!("Match store initialized");
        Ok(store)
    }

    /// Override the per-row expiry
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS live_matches (
                fixture_id INTEGER PRIMARY KEY,
                sport TEXT NOT NULL,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create live_matches table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS live_match_index (
                fixture_id INTEGER PRIMARY KEY
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create live_match_index table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_live_matches_expires
            ON live_matches (expires_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MatchStateStore for SqliteMatchStore {
    async fn set_matches(&self, states: &[LiveMatchState]) -> StoreResult<()> {
        if states.is_empty() {
            return Ok(());
        }

        let now_ms = Utc::now().timestamp_millis();
        let expires_at = now_ms + self.ttl.num_milliseconds();

        let mut tx = self.pool.begin().await?;

        // Drop dead rows while we hold the write transaction
        sqlx::query("DELETE FROM live_matches WHERE expires_at <= ?")
            .bind(now_ms)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM live_match_index WHERE fixture_id NOT IN (SELECT fixture_id FROM live_matches)",
        )
        .execute(&mut *tx)
        .await?;

        for state in states {
            let payload = serde_json::to_string(state)?;

            sqlx::query(
                r#"
                INSERT INTO live_matches (fixture_id, sport, payload, updated_at, expires_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(fixture_id) DO UPDATE SET
                    sport = excluded.sport,
                    payload = excluded.payload,
                    updated_at = excluded.updated_at,
                    expires_at = excluded.expires_at
                "#,
            )
            .bind(state.fixture_id)
            .bind(state.sport.as_str())
            .bind(&payload)
            .bind(state.last_updated_at.to_rfc3339())
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT OR IGNORE INTO live_match_index (fixture_id) VALUES (?)")
                .bind(state.fixture_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!("Stored {} live matches", states.len());
        Ok(())
    }

    async fn get_match(&self, fixture_id: i64) -> StoreResult<Option<LiveMatchState>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT payload FROM live_matches WHERE fixture_id = ? AND expires_at > ?",
        )
        .bind(fixture_id)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((payload,)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn get_all_matches(&self) -> StoreResult<Vec<LiveMatchState>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT m.payload
            FROM live_match_index i
            JOIN live_matches m ON m.fixture_id = i.fixture_id
            WHERE m.expires_at > ?
            ORDER BY m.fixture_id
            "#,
        )
        .bind(Utc::now().timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(payload,)| serde_json::from_str::<LiveMatchState>(&payload).map_err(StoreError::from))
            .collect()
    }

    async fn remove_matches(&self, fixture_ids: &[i64]) -> StoreResult<()> {
        if fixture_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for fixture_id in fixture_ids {
            sqlx::query("DELETE FROM live_match_index WHERE fixture_id = ?")
                .bind(fixture_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM live_matches WHERE fixture_id = ?")
                .bind(fixture_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!("Removed {} live matches", fixture_ids.len());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_sqlite;
    use crate::models::Sport;

    fn state(fixture_id: i64, score_home: u32) -> LiveMatchState {
        LiveMatchState {
            fixture_id,
            status: "Q2".to_string(),
            minute: None,
            score_home,
            score_away: 40,
            last_updated_at: Utc::now(),
            league_id: Some(12),
            sport: Sport::Basketball,
        }
    }

    async fn open(dir: &tempfile::TempDir) -> SqliteMatchStore {
        let url = format!("sqlite:{}", dir.path().join("live.db").display());
        let pool = connect_sqlite(&url).await.unwrap();
        SqliteMatchStore::new(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_set_get_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;

        store
            .set_matches(&[state(1_000_000_002, 50), state(1_000_000_001, 44)])
            .await
            .unwrap();

        let fetched = store.get_match(1_000_000_001).await.unwrap().unwrap();
        assert_eq!(fetched.score_home, 44);

        let all = store.get_all_matches().await.unwrap();
        let ids: Vec<i64> = all.iter().map(|m| m.fixture_id).collect();
        assert_eq!(ids, vec![1_000_000_001, 1_000_000_002]);
    }

    #[tokio::test]
    async fn test_set_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;

        store.set_match(&state(7, 10)).await.unwrap();
        store.set_match(&state(7, 12)).await.unwrap();

        let all = store.get_all_matches().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].score_home, 12);
    }

    #[tokio::test]
    async fn test_remove_matches() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;

        store
            .set_matches(&[state(1, 1), state(2, 2), state(3, 3)])
            .await
            .unwrap();
        store.remove_matches(&[1, 3]).await.unwrap();
        store.remove_match(42).await.unwrap(); // Unknown id is a no-op

        let ids: Vec<i64> = store
            .get_all_matches()
            .await
            .unwrap()
            .iter()
            .map(|m| m.fixture_id)
            .collect();
        assert_eq!(ids, vec![2]);
        assert!(store.get_match(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_rows_are_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await.with_ttl(Duration::milliseconds(-1));

        store.set_match(&state(5, 5)).await.unwrap();

        assert!(store.get_match(5).await.unwrap().is_none());
        assert!(store.get_all_matches().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open(&dir).await;
            store.set_match(&state(9, 9)).await.unwrap();
        }

        let store = open(&dir).await;
        assert_eq!(store.get_match(9).await.unwrap().unwrap().score_home, 9);
    }
}
