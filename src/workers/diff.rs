use std::collections::{HashMap, HashSet};

use crate::models::LiveMatchState;

/// What a tick must write to bring the store in line with the admitted set
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SnapshotDiff {
    /// New or changed matches
    pub upserts: Vec<LiveMatchState>,
    /// Fixture IDs in the store that are no longer admitted
    pub removals: Vec<i64>,
    /// Admitted matches already stored unchanged
    pub unchanged: usize,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Compare the admitted set against the stored snapshot
///
/// Matches equal in every field but the write timestamp are left alone.
pub fn diff_snapshot(current: &[LiveMatchState], admitted: Vec<LiveMatchState>) -> SnapshotDiff {
    let stored: HashMap<i64, &LiveMatchState> =
        current.iter().map(|m| (m.fixture_id, m)).collect();
    let admitted_ids: HashSet<i64> = admitted.iter().map(|m| m.fixture_id).collect();

    let mut diff = SnapshotDiff::default();

    for state in admitted {
        match stored.get(&state.fixture_id) {
            Some(existing) if existing.same_state(&state) => diff.unchanged += 1,
            _ => diff.upserts.push(state),
        }
    }

    diff.removals = current
        .iter()
        .map(|m| m.fixture_id)
        .filter(|id| !admitted_ids.contains(id))
        .collect();

    diff
}
