pub mod diff;
pub mod live_poller;
pub mod poll_cycle;

pub use diff::{diff_snapshot, SnapshotDiff};
pub use live_poller::LivePollerWorker;
pub use poll_cycle::{PollCycle, PollOutcome, PollSummary, SkipReason};
