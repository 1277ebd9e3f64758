use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::api::api_sports::{parse_envelope, ApiSportsClient};
use crate::api::{LiveFeed, RawFixture};
use crate::models::Sport;

pub const FOOTBALL_API_URL: &str = "https://v3.football.api-sports.io";

/// Client for API-Football live fixtures
pub struct FootballClient {
    api: ApiSportsClient,
}

#[derive(Debug, Deserialize)]
struct FixtureItem {
    fixture: FixtureInfo,
    league: LeagueInfo,
    goals: Goals,
}

#[derive(Debug, Deserialize)]
struct FixtureInfo {
    id: i64,
    status: FixtureStatus,
}

#[derive(Debug, Deserialize)]
struct FixtureStatus {
    short: String,
    elapsed: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LeagueInfo {
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Goals {
    home: Option<i64>,
    away: Option<i64>,
}

impl FootballClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(FOOTBALL_API_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self> {
        Ok(Self {
            api: ApiSportsClient::new(base_url, api_key)?,
        })
    }
}

/// Parse a `/fixtures?live=all` body, keeping only in-play statuses
pub fn parse_live_fixtures(body: &str) -> Result<Vec<RawFixture>> {
    let items: Vec<FixtureItem> = parse_envelope(body)?;

    Ok(items
        .into_iter()
        .filter(|item| Sport::Football.is_live_status(&item.fixture.status.short))
        .map(|item| RawFixture {
            native_id: item.fixture.id,
            status: item.fixture.status.short,
            league_id: item.league.id,
            minute: item
                .fixture
                .status
                .elapsed
                .and_then(|m| u32::try_from(m).ok()),
            score_home: item.goals.home.unwrap_or(0),
            score_away: item.goals.away.unwrap_or(0),
        })
        .collect())
}

#[async_trait]
impl LiveFeed for FootballClient {
    fn sport(&self) -> Sport {
        Sport::Football
    }

    async fn fetch_live(&self, _now: DateTime<Utc>) -> Result<Vec<RawFixture>> {
        let body = self
            .api
            .get("/fixtures", &[("live", "all".to_string())])
            .await?;

        let fixtures = parse_live_fixtures(&body)?;
        info!("API-Football returned {} live fixtures", fixtures.len());

        Ok(fixtures)
    }
}
