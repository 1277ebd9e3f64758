use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use futures::future::join_all;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::api::RawFixture;

/// Per-request timeout for upstream calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Games tipping off late the previous UTC day can still be live this long
/// after midnight
pub const OVERNIGHT_WINDOW_HOURS: u32 = 6;

/// Shared HTTP plumbing for the API-Sports family of APIs
#[derive(Clone)]
pub struct ApiSportsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Envelope wrapping every API-Sports response
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    /// `[]` on success, an object or array of messages on failure
    #[serde(default)]
    errors: serde_json::Value,
    #[serde(default = "Vec::new")]
    response: Vec<T>,
}

impl ApiSportsClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// GET `path` and return the raw body
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);

        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("x-apisports-key", &self.api_key)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to call {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("API-Sports error: {} - {}", status, text);
        }

        response
            .text()
            .await
            .context("Failed to read API-Sports response body")
    }

    /// GET `path?date=` once per date, all requests in flight together
    ///
    /// Every request is sent even when another fails, so the number of
    /// metered calls is always `dates.len()`.
    pub async fn get_by_dates(&self, path: &str, dates: &[NaiveDate]) -> Result<Vec<String>> {
        let requests = dates.iter().map(|date| async move {
            let query = [("date", date.format("%Y-%m-%d").to_string())];
            self.get(path, &query).await
        });

        join_all(requests).await.into_iter().collect()
    }
}

/// UTC dates whose `/games` listing can hold a game live at `now`
pub fn game_dates(now: DateTime<Utc>) -> Vec<NaiveDate> {
    let today = now.date_naive();

    match today.pred_opt() {
        Some(yesterday) if now.hour() < OVERNIGHT_WINDOW_HOURS => vec![yesterday, today],
        _ => vec![today],
    }
}

/// Concatenate per-date results, keeping the first record of each game
pub fn merge_days(days: Vec<Vec<RawFixture>>) -> Vec<RawFixture> {
    let mut seen = HashSet::new();
    days.into_iter()
        .flatten()
        .filter(|fixture| seen.insert(fixture.native_id))
        .collect()
}

/// Decode an API-Sports envelope, failing on reported errors
pub fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).context("Failed to parse API-Sports response")?;

    let has_errors = match &envelope.errors {
        serde_json::Value::Null => false,
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(fields) => !fields.is_empty(),
        _ => true,
    };

    if has_errors {
        anyhow::bail!("API-Sports reported errors: {}", envelope.errors);
    }

    Ok(envelope.response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Deserialize)]
    struct Item {
        id: i64,
    }

    #[test]
    fn test_parse_envelope_ok() {
        let items: Vec<Item> =
            parse_envelope(r#"{"errors":[],"results":2,"response":[{"id":1},{"id":2}]}"#)
                .unwrap();
        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_parse_envelope_reports_errors() {
        let err = parse_envelope::<Item>(
            r#"{"errors":{"token":"Error/Missing application key."},"response":[]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("reported errors"));
    }

    #[test]
    fn test_parse_envelope_rejects_malformed_body() {
        assert!(parse_envelope::<Item>("<html>rate limited</html>").is_err());
    }

    #[test]
    fn test_game_dates_cover_previous_day_after_midnight() {
        let just_after = Utc.with_ymd_and_hms(2026, 10, 20, 0, 30, 0).unwrap();
        assert_eq!(
            game_dates(just_after),
            vec![
                NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
                NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            ]
        );

        let afternoon = Utc.with_ymd_and_hms(2026, 10, 20, 15, 0, 0).unwrap();
        assert_eq!(
            game_dates(afternoon),
            vec![NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()]
        );

        let window_end = Utc
            .with_ymd_and_hms(2026, 10, 20, OVERNIGHT_WINDOW_HOURS, 0, 0)
            .unwrap();
        assert_eq!(game_dates(window_end).len(), 1);
    }

    #[test]
    fn test_merge_days_keeps_first_record_per_game() {
        let fixture = |native_id: i64, score_home: i64| RawFixture {
            native_id,
            status: "Q4".to_string(),
            league_id: Some(12),
            minute: None,
            score_home,
            score_away: 0,
        };

        let merged = merge_days(vec![
            vec![fixture(1, 90), fixture(2, 40)],
            vec![fixture(2, 41), fixture(3, 10)],
        ]);

        assert_eq!(
            merged.iter().map(|f| (f.native_id, f.score_home)).collect::<Vec<_>>(),
            vec![(1, 90), (2, 40), (3, 10)]
        );
    }
}
