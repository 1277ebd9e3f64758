use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::api::api_sports::{game_dates, merge_days, parse_envelope, ApiSportsClient};
use crate::api::{LiveFeed, RawFixture};
use crate::models::Sport;

pub const RUGBY_API_URL: &str = "https://v1.rugby.api-sports.io";

/// Client for API-Rugby games
pub struct RugbyClient {
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
}

#[derive(Debug, Deserialize)]
struct LeagueInfo {
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Scores {
    home: Option<i64>,
    away: Option<i64>,
}

impl RugbyClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(RUGBY_API_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self> {
        Ok(Self {
            api: ApiSportsClient::new(base_url, api_key)?,
        })
    }
}

/// Parse a `/games` body, keeping only in-play statuses
///
/// API-Rugby sends no match clock, so `minute` is always empty.
pub fn parse_live_games(body: &str) -> Result<Vec<RawFixture>> {
    let items: Vec<GameItem> = parse_envelope(body)?;

    Ok(items
        .into_iter()
        .filter(|item| Sport::Rugby.is_live_status(&item.status.short))
        .map(|item| RawFixture {
            native_id: item.id,
            status: item.status.short,
            league_id: item.league.id,
            minute: None,
            score_home: item.scores.home.unwrap_or(0),
            score_away: item.scores.away.unwrap_or(0),
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
impl LiveFeed for RugbyClient {
    fn sport(&self) -> Sport {
        Sport::Rugby
    }

    fn planned_calls(&self, now: DateTime<Utc>) -> usize {
        game_dates(now).len()
    }

    /// API-Rugby has no live filter; games dated today (and yesterday just
    /// after midnight) are filtered by status
    async fn fetch_live(&self, now: DateTime<Utc>) -> Result<Vec<RawFixture>> {
        let bodies = self.api.get_by_dates("/games", &game_dates(now)).await?;

        let games = parse_live_days(&bodies)?;
        info!("API-Rugby returned {} live games", games.len());

        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_live_games() {
        let body = r#"{
            "errors": [],
            "response": [
                {"id": 9001, "status": {"long": "Second Half", "short": "2H"},
                 "league": {"id": 16}, "scores": {"home": 21, "away": 17}},
                {"id": 9002, "status": {"long": "Finished", "short": "FT"},
                 "league": {"id": 16}, "scores": {"home": 30, "away": 3}},
                {"id": 9003, "status": {"long": "Penalty Time", "short": "PT"},
                 "league": {"id": 54}, "scores": {"home": null, "away": 12}}
            ]
        }"#;

        let games = parse_live_games(body).unwrap();

        assert_eq!(games.iter().map(|g| g.native_id).collect::<Vec<_>>(), vec![9001, 9003]);
        assert!(games.iter().all(|g| g.minute.is_none()));
        assert_eq!((games[1].score_home, games[1].score_away), (0, 12));
    }

    #[test]
    fn test_game_from_previous_day_stays_live() {
        let yesterday = r#"{"errors": [], "response": [
            {"id": 7001, "date": "2026-10-19T23:45:00+00:00", "status": {"short": "1H"},
             "league": {"id": 54}, "scores": {"home": 3, "away": 0}}
        ]}"#;
        let today = r#"{"errors": [], "response": []}"#;

        let games = parse_live_days(&[yesterday.to_string(), today.to_string()]).unwrap();
        assert_eq!(games.iter().map(|g| g.native_id).collect::<Vec<_>>(), vec![7001]);
    }

    #[test]
    fn test_one_bad_day_fails_the_fetch() {
        let today = r#"{"errors": [], "response": []}"#;
        let bad = "<html>gateway timeout</html>";
        assert!(parse_live_days(&[today.to_string(), bad.to_string()]).is_err());
    }

    #[test]
    fn test_reported_errors_fail_the_call() {
        let body = r#"{"errors":{"requests":"You have reached the request limit for the day"},"response":[]}"#;
        assert!(parse_live_games(body).is_err());
    }
}
