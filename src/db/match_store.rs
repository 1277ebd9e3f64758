use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::LiveMatchState;

/// Current snapshot of admitted live matches, keyed by fixture ID
///
/// Implementations must be safe for one writer and many concurrent readers.
#[async_trait]
pub trait MatchStateStore: Send + Sync {
    /// Insert or replace one match
    async fn set_match(&self, state: &LiveMatchState) -> StoreResult<()> {
        self.set_matches(std::slice::from_ref(state)).await
    }

    /// Insert or replace a batch of matches
    async fn set_matches(&self, states: &[LiveMatchState]) -> StoreResult<()>;

    async fn get_match(&self, fixture_id: i64) -> StoreResult<Option<LiveMatchState>>;

    /// All live matches, ordered by fixture ID
    async fn get_all_matches(&self) -> StoreResult<Vec<LiveMatchState>>;

    async fn remove_match(&self, fixture_id: i64) -> StoreResult<()> {
        self.remove_matches(&[fixture_id]).await
    }

    async fn remove_matches(&self, fixture_ids: &[i64]) -> StoreResult<()>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}
