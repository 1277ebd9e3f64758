use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::admission::LeaguePolicy;
use crate::budget::{self, UsageTier};
use crate::models::Sport;

/// Longest accepted base poll interval (one day)
pub const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Polling limits for one sport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SportSettings {
    /// Interval between polls at the normal tier
    pub base_interval: Duration,

    /// Maximum matches admitted per tick
    pub max_live: usize,
}

impl SportSettings {
    pub fn defaults(sport: Sport) -> Self {
        let max_live = match sport {
            Sport::Football => 10,
            Sport::Basketball => 6,
            Sport::Rugby => 4,
        };

        Self {
            base_interval: Duration::from_secs(60),
            max_live,
        }
    }
}

/// Everything the poll cycle needs to decide what to do, injected at construction
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Suspends all polling when set
    pub kill_switch: bool,

    /// API calls allowed per calendar month
    pub monthly_budget: u64,

    /// Sport whose interval gates the whole tick
    pub primary_sport: Sport,

    pub sports: HashMap<Sport, SportSettings>,

    pub leagues: LeaguePolicy,
}

impl LiveConfig {
    pub fn new(monthly_budget: u64, leagues: LeaguePolicy) -> Self {
        Self {
            kill_switch: false,
            monthly_budget,
            primary_sport: Sport::Football,
            sports: Sport::ALL
                .into_iter()
                .map(|s| (s, SportSettings::defaults(s)))
                .collect(),
            leagues,
        }
    }

    pub fn settings(&self, sport: Sport) -> SportSettings {
        self.sports
            .get(&sport)
            .copied()
            .unwrap_or_else(|| SportSettings::defaults(sport))
    }

    /// Tier-adjusted interval for a sport, `None` when suspended
    pub fn poll_interval(&self, sport: Sport, tier: UsageTier) -> Option<Duration> {
        budget::poll_interval(self.settings(sport).base_interval, tier)
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// API-Sports key shared by all three sport APIs
    pub api_sports_key: String,

    /// SQLite URL; unset selects the file fallback
    pub database_url: Option<String>,

    /// Fallback snapshot file
    pub state_file: PathBuf,

    /// Interval in seconds between poll cycle triggers
    pub tick_interval: u64,

    pub live: LiveConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let leagues_path = env::var("LIVE_LEAGUES_PATH")
            .unwrap_or_else(|_| "data/live_leagues.json".to_string());

        let mut live = LiveConfig::new(
            parse_var("LIVE_MONTHLY_BUDGET", 3000)?,
            load_league_policy(Path::new(&leagues_path))?,
        );

        live.kill_switch = parse_flag("LIVE_POLL_KILL_SWITCH")?;
        live.primary_sport = env::var("LIVE_PRIMARY_SPORT")
            .unwrap_or_else(|_| "football".to_string())
            .parse()
            .context("LIVE_PRIMARY_SPORT must be football, basketball or rugby")?;

        for sport in Sport::ALL {
            let defaults = SportSettings::defaults(sport);
            let prefix = sport.as_str().to_uppercase();

            let interval_key = format!("{}_POLL_INTERVAL_SECS", prefix);
            let interval_secs = check_poll_interval(
                &interval_key,
                parse_var(&interval_key, defaults.base_interval.as_secs())?,
            )?;
            let max_live = parse_var(&format!("{}_MAX_LIVE", prefix), defaults.max_live)?;

            live.sports.insert(
                sport,
                SportSettings {
                    base_interval: Duration::from_secs(interval_secs),
                    max_live,
                },
            );
        }

        Ok(Config {
            api_sports_key: env::var("API_SPORTS_KEY").unwrap_or_default(),

            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),

            state_file: env::var("LIVE_STATE_FILE")
                .unwrap_or_else(|_| "data/live_state.json".to_string())
                .into(),

            tick_interval: parse_var("TICK_INTERVAL_SECS", 15)?,

            live,
        })
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}

fn check_poll_interval(key: &str, secs: u64) -> Result<u64> {
    if secs > MAX_POLL_INTERVAL_SECS {
        anyhow::bail!(
            "{} must be at most {} seconds, got {}",
            key,
            MAX_POLL_INTERVAL_SECS,
            secs
        );
    }
    Ok(secs)
}

fn parse_flag(key: &str) -> Result<bool> {
    match env::var(key) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "" | "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("{} must be a boolean, got {:?}", key, other),
        },
        Err(_) => Ok(false),
    }
}

/// Load league policy from JSON file or use the built-in table
fn load_league_policy(path: &Path) -> Result<LeaguePolicy> {
    if path.exists() {
        LeaguePolicy::load_from_file(path)
    } else {
        info!("No league table at {}, using built-in policy", path.display());
        Ok(LeaguePolicy::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_uses_sport_base() {
        let mut config = LiveConfig::new(3000, LeaguePolicy::new());
        config.sports.insert(
            Sport::Rugby,
            SportSettings {
                base_interval: Duration::from_secs(90),
                max_live: 2,
            },
        );

        assert_eq!(
            config.poll_interval(Sport::Rugby, UsageTier::Tier70),
            Some(Duration::from_secs(180))
        );
        assert_eq!(
            config.poll_interval(Sport::Football, UsageTier::Normal),
            Some(Duration::from_secs(60))
        );
        assert_eq!(config.poll_interval(Sport::Football, UsageTier::Tier95), None);
    }

    #[test]
    fn test_missing_sport_falls_back_to_defaults() {
        let mut config = LiveConfig::new(3000, LeaguePolicy::new());
        config.sports.clear();

        assert_eq!(
            config.settings(Sport::Basketball),
            SportSettings::defaults(Sport::Basketball)
        );
    }

    #[test]
    fn test_check_poll_interval_rejects_absurd_values() {
        assert_eq!(check_poll_interval("FOOTBALL_POLL_INTERVAL_SECS", 60).unwrap(), 60);
        assert_eq!(
            check_poll_interval("FOOTBALL_POLL_INTERVAL_SECS", MAX_POLL_INTERVAL_SECS).unwrap(),
            MAX_POLL_INTERVAL_SECS
        );

        let err = check_poll_interval("RUGBY_POLL_INTERVAL_SECS", u64::MAX).unwrap_err();
        assert!(err.to_string().contains("RUGBY_POLL_INTERVAL_SECS"));
    }
}
