pub mod api_sports;
pub mod basketball;
pub mod football;
pub mod normalize;
pub mod rugby;

pub use api_sports::ApiSportsClient;
pub use basketball::BasketballClient;
pub use football::FootballClient;
pub use rugby::RugbyClient;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::Sport;

/// Provider record for one live fixture, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFixture {
    /// Provider-native fixture/game ID
    pub native_id: i64,

    /// Provider status short code
    pub status: String,

    pub league_id: Option<i64>,

    /// Elapsed minute or period clock, if the provider sends one
    pub minute: Option<u32>,

    pub score_home: i64,

    pub score_away: i64,
}

/// A per-sport source of live fixtures
///
/// Implementations return only fixtures whose status is in the sport's live
/// allow-list, and issue exactly `planned_calls(now)` metered requests per
/// `fetch_live(now)`, whether those requests succeed or not.
#[async_trait]
pub trait LiveFeed: Send + Sync {
    fn sport(&self) -> Sport;

    /// Metered requests a fetch at `now` will make
    fn planned_calls(&self, _now: DateTime<Utc>) -> usize {
        1
    }

    async fn fetch_live(&self, now: DateTime<Utc>) -> Result<Vec<RawFixture>>;
}
