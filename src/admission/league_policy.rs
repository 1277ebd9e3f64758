use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::models::{LeagueTable, LiveLeagueConfig, Sport};

/// Lookup of league polling policy by `(sport, league_id)`
#[derive(Debug, Clone, Default)]
pub struct LeaguePolicy {
    leagues: HashMap<(Sport, i64), LiveLeagueConfig>,
}

impl LeaguePolicy {
    /// Create a policy with no leagues
    pub fn new() -> Self {
        Self {
            leagues: HashMap::new(),
        }
    }

    pub fn from_leagues(leagues: impl IntoIterator<Item = LiveLeagueConfig>) -> Self {
        let mut policy = Self::new();
        for league in leagues {
            policy.insert(league);
        }
        policy
    }

    /// Load the league table from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).context("Failed to read league table file")?;

        let table: LeagueTable =
            serde_json::from_str(&content).context("Failed to parse league table JSON")?;

        let policy = Self::from_leagues(table.leagues);
        info!("Loaded {} league policies", policy.len());

        Ok(policy)
    }

    /// Built-in table used when no league file is present
    pub fn builtin() -> Self {
        Self::from_leagues([
            // Football (API-Football ids)
            LiveLeagueConfig::new(Sport::Football, 2, 1), // UEFA Champions League
            LiveLeagueConfig::new(Sport::Football, 39, 1), // Premier League
            LiveLeagueConfig::new(Sport::Football, 140, 2), // La Liga
            LiveLeagueConfig::new(Sport::Football, 135, 2), // Serie A
            LiveLeagueConfig::new(Sport::Football, 78, 2), // Bundesliga
            LiveLeagueConfig::new(Sport::Football, 61, 3), // Ligue 1
            LiveLeagueConfig::new(Sport::Football, 3, 3), // UEFA Europa League
            // Basketball (API-Basketball ids)
            LiveLeagueConfig::new(Sport::Basketball, 12, 1), // NBA
            LiveLeagueConfig::new(Sport::Basketball, 120, 2), // Euroleague
            // Rugby (API-Rugby ids)
            LiveLeagueConfig::new(Sport::Rugby, 54, 1), // Six Nations
            LiveLeagueConfig::new(Sport::Rugby, 13, 2), // Premiership
            LiveLeagueConfig::new(Sport::Rugby, 16, 2), // Top 14
        ])
    }

    pub fn insert(&mut self, league: LiveLeagueConfig) {
        self.leagues.insert((league.sport, league.league_id), league);
    }

    pub fn get(&self, sport: Sport, league_id: i64) -> Option<&LiveLeagueConfig> {
        self.leagues.get(&(sport, league_id))
    }

    /// Priority of an enabled league, `None` if unknown or disabled
    pub fn enabled_priority(&self, sport: Sport, league_id: i64) -> Option<u32> {
        self.get(sport, league_id)
            .filter(|l| l.enabled)
            .map(|l| l.priority)
    }

    pub fn len(&self) -> usize {
        self.leagues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leagues.is_empty()
    }
}
