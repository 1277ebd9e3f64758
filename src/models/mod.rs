pub mod fixture_id;
pub mod league;
pub mod match_state;

pub use fixture_id::FixtureIdError;
pub use league::{LeagueTable, LiveLeagueConfig};
pub use match_state::{LiveMatchCache, LiveMatchState, Sport};
