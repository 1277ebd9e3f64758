use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sports covered by the live poller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Football,
    Basketball,
    Rugby,
}

impl Sport {
    pub const ALL: [Sport; 3] = [Sport::Football, Sport::Basketball, Sport::Rugby];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Football => "football",
            Sport::Basketball => "basketball",
            Sport::Rugby => "rugby",
        }
    }

    /// Provider status codes that mean the match is in progress
    pub fn live_statuses(&self) -> &'static [&'static str] {
        match self {
            Sport::Football => &["1H", "HT", "2H", "ET", "BT", "P", "SUSP", "INT", "LIVE"],
            Sport::Basketball => &["Q1", "Q2", "Q3", "Q4", "OT", "BT", "HT"],
            Sport::Rugby => &["1H", "HT", "2H", "ET", "BT", "PT"],
        }
    }

    pub fn is_live_status(&self, status: &str) -> bool {
        self.live_statuses().contains(&status)
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "football" | "soccer" => Ok(Sport::Football),
            "basketball" => Ok(Sport::Basketball),
            "rugby" => Ok(Sport::Rugby),
            other => anyhow::bail!("unknown sport: {}", other),
        }
    }
}

/// Published snapshot of one live fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMatchState {
    /// Cross-sport fixture ID (see `fixture_id::encode`)
    pub fixture_id: i64,

    /// Provider status code, e.g. "2H" or "Q3"
    pub status: String,

    /// Elapsed minute, when the provider exposes one
    pub minute: Option<u32>,

    pub score_home: u32,

    pub score_away: u32,

    /// When this record was last written
    pub last_updated_at: DateTime<Utc>,

    /// Provider-native competition ID
    pub league_id: Option<i64>,

    pub sport: Sport,
}

impl LiveMatchState {
    /// Field equality ignoring the write timestamp
    pub fn same_state(&self, other: &LiveMatchState) -> bool {
        self.fixture_id == other.fixture_id
            && self.status == other.status
            && self.minute == other.minute
            && self.score_home == other.score_home
            && self.score_away == other.score_away
            && self.league_id == other.league_id
            && self.sport == other.sport
    }
}

/// Map of fixture_id -> LiveMatchState
pub type LiveMatchCache = std::collections::HashMap<i64, LiveMatchState>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> LiveMatchState {
        LiveMatchState {
            fixture_id: 123,
            status: "2H".to_string(),
            minute: Some(67),
            score_home: 1,
            score_away: 0,
            last_updated_at: Utc::now(),
            league_id: Some(39),
            sport: Sport::Football,
        }
    }

    #[test]
    fn test_same_state_ignores_timestamp() {
        let a = sample();
        let mut b = a.clone();
        b.last_updated_at = a.last_updated_at + Duration::seconds(90);
        assert!(a.same_state(&b));

        b.score_away = 1;
        assert!(!a.same_state(&b));
    }

    #[test]
    fn test_sport_serde_is_lowercase() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"sport\":\"football\""));

        let parsed: LiveMatchState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sport, Sport::Football);
    }

    #[test]
    fn test_sport_from_str() {
        assert_eq!("Basketball".parse::<Sport>().unwrap(), Sport::Basketball);
        assert_eq!(" rugby ".parse::<Sport>().unwrap(), Sport::Rugby);
        assert!("cricket".parse::<Sport>().is_err());
    }

    #[test]
    fn test_live_statuses() {
        assert!(Sport::Football.is_live_status("HT"));
        assert!(!Sport::Football.is_live_status("FT"));
        assert!(!Sport::Football.is_live_status("NS"));
        assert!(Sport::Basketball.is_live_status("OT"));
        assert!(Sport::Rugby.is_live_status("PT"));
        assert!(!Sport::Rugby.is_live_status("Q1"));
    }
}
