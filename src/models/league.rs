use serde::{Deserialize, Serialize};

use super::Sport;

/// Static polling policy for one competition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveLeagueConfig {
    /// Provider-native league ID
    pub league_id: i64,

    pub sport: Sport,

    /// Disabled leagues are never polled
    pub enabled: bool,

    /// Lower number = higher priority
    pub priority: u32,
}

impl LiveLeagueConfig {
    pub fn new(sport: Sport, league_id: i64, priority: u32) -> Self {
        Self {
            league_id,
            sport,
            enabled: true,
            priority,
        }
    }
}

/// League table file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueTable {
    pub leagues: Vec<LiveLeagueConfig>,
}
