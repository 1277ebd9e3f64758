use thiserror::Error;

use super::Sport;

/// Width of each sport's band; native IDs must stay below it
///
/// Every sport owns a disjoint band so fixtures from different providers
/// share one key space in the store.
pub const BAND_WIDTH: i64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureIdError {
    #[error("{sport} native id {native_id} is outside 0..1000000000")]
    OutOfBand { sport: Sport, native_id: i64 },
}

/// Offset of a sport's band
pub fn offset(sport: Sport) -> i64 {
    match sport {
        Sport::Football => 0,
        Sport::Basketball => BAND_WIDTH,
        Sport::Rugby => 2 * BAND_WIDTH,
    }
}

/// Encode a provider-native ID into the shared fixture key space
pub fn encode(sport: Sport, native_id: i64) -> Result<i64, FixtureIdError> {
    if !(0..BAND_WIDTH).contains(&native_id) {
        return Err(FixtureIdError::OutOfBand { sport, native_id });
    }
    Ok(offset(sport) + native_id)
}

/// Recover `(sport, native_id)` from a fixture ID, highest band first
pub fn decode(fixture_id: i64) -> Option<(Sport, i64)> {
    if fixture_id < 0 || fixture_id >= 3 * BAND_WIDTH {
        return None;
    }

    [Sport::Rugby, Sport::Basketball, Sport::Football]
        .into_iter()
        .find(|sport| fixture_id >= offset(*sport))
        .map(|sport| (sport, fixture_id - offset(sport)))
}
