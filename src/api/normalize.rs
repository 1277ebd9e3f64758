use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::api::RawFixture;
use crate::models::{fixture_id, LiveMatchState, Sport};

/// Whether the sport's provider sends a meaningful match clock
fn exposes_minute(sport: Sport) -> bool {
    match sport {
        Sport::Football | Sport::Basketball => true,
        Sport::Rugby => false,
    }
}

fn clamp_score(score: i64) -> u32 {
    u32::try_from(score.max(0)).unwrap_or(u32::MAX)
}

/// Map one provider record to a snapshot entry stamped with `now`
///
/// Returns `None` for records that cannot be published: a native ID outside
/// the sport's band, or a status that is not live.
pub fn normalize_fixture(sport: Sport, raw: RawFixture, now: DateTime<Utc>) -> Option<LiveMatchState> {
    let status = raw.status.trim().to_uppercase();
    if !sport.is_live_status(&status) {
        debug!(sport = %sport, native_id = raw.native_id, status = %status, "Dropping non-live record");
        return None;
    }

    let fixture_id = match fixture_id::encode(sport, raw.native_id) {
        Ok(id) => id,
        Err(e) => {
            warn!("Dropping record: {}", e);
            return None;
        }
    };

    Some(LiveMatchState {
        fixture_id,
        status,
        minute: raw.minute.filter(|_| exposes_minute(sport)),
        score_home: clamp_score(raw.score_home),
        score_away: clamp_score(raw.score_away),
        last_updated_at: now,
        league_id: raw.league_id,
        sport,
    })
}

/// Normalize every record of one sport, dropping unpublishable ones
pub fn normalize(sport: Sport, raws: Vec<RawFixture>, now: DateTime<Utc>) -> Vec<LiveMatchState> {
    raws.into_iter()
        .filter_map(|raw| normalize_fixture(sport, raw, now))
        .collect()
}
