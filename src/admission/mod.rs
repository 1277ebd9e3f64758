pub mod league_policy;

pub use league_policy::LeaguePolicy;

use tracing::debug;

use crate::models::{LiveMatchState, Sport};

/// Keep matches from enabled leagues, best priority first, at most `max_live`
///
/// The cap is applied after ranking so minor fixtures never push out the top
/// competitions.
pub fn admit(
    sport: Sport,
    matches: Vec<LiveMatchState>,
    policy: &LeaguePolicy,
    max_live: usize,
) -> Vec<LiveMatchState> {
    let total = matches.len();

    let mut eligible: Vec<(u32, LiveMatchState)> = matches
        .into_iter()
        .filter_map(|m| {
            let priority = m
                .league_id
                .and_then(|league_id| policy.enabled_priority(sport, league_id))?;
            Some((priority, m))
        })
        .collect();

    let eligible_count = eligible.len();

    // sort_by_key is stable: equal priorities keep provider order
    eligible.sort_by_key(|(priority, _)| *priority);
    eligible.truncate(max_live);

    debug!(
        sport = %sport,
        total,
        eligible = eligible_count,
        admitted = eligible.len(),
        "Admission complete"
    );

    eligible.into_iter().map(|(_, m)| m).collect()
}
