use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::api::api_sports::{game_dates, merge_days, parse_envelope, ApiSportsClient};
use crate::api::{LiveFeed, RawFixture};
use crate::models::Sport;

pub const BASKETBALL_API_URL: &str = "https://v1.basketball.api-sports.io";

/// Client for API-Basketball games
pub struct BasketballClient {
    api: ApiSportsClient,
}

#[derive(Debug, Deserialize)]
struct GameItem {
    id: i64,
    status: GameStatus,
    league: LeagueInfo,
    scores: Scores,
}

#[derive(Debug, Deserialize)]
struct GameStatus {
    short: String,
    /// Minutes into the current quarter, sent as a string
    timer: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LeagueInfo {
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Scores {
    home: TeamScore,
    away: TeamScore,
}

#[derive(Debug, Deserialize)]
struct TeamScore {
    total: Option<i64>,
}

impl BasketballClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(BASKETBALL_API_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self> {
        Ok(Self {
            api: ApiSportsClient::new(base_url, api_key)?,
        })
    }
}

fn parse_timer(timer: Option<serde_json::Value>) -> Option<u32> {
    match timer? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a `/games` body, keeping only in-play statuses
pub fn parse_live_games(body: &str) -> Result<Vec<RawFixture>> {
    let items: Vec<GameItem> = parse_envelope(body)?;

    Ok(items
        .into_iter()
        .filter(|item| Sport::Basketball.is_live_status(&item.status.short))
        .map(|item| RawFixture {
            native_id: item.id,
            status: item.status.short,
            league_id: item.league.id,
            minute: parse_timer(item.status.timer),
            score_home: item.scores.home.total.unwrap_or(0),
            score_away: item.scores.away.total.unwrap_or(0),
        })
        .collect())
}

/// Parse one `/games` body per date into a single list of live games
pub fn parse_live_days(bodies: &[String]) -> Result<Vec<RawFixture>> {
    let days = bodies
        .iter()
        .map(|body| parse_live_games(body))
        .collect::<Result<Vec<_>>>()?;

    Ok(merge_days(days))
}

#[async_trait]
impl LiveFeed for BasketballClient {
    fn sport(&self) -> Sport {
        Sport::Basketball
    }

    fn planned_calls(&self, now: DateTime<Utc>) -> usize {
        game_dates(now).len()
    }

    /// API-Basketball has no live filter; games dated today (and yesterday just
    /// after midnight) are filtered by status
    async fn fetch_live(&self, now: DateTime<Utc>) -> Result<Vec<RawFixture>> {
        let bodies = self.api.get_by_dates("/games", &game_dates(now)).await?;

        let games = parse_live_days(&bodies)?;
        info!("API-Basketball returned {} live games", games.len());

        Ok(games)
    }
}
