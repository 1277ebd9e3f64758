pub mod connect;
pub mod file_store;
pub mod match_store;
pub mod sqlite_store;
pub mod sqlite_usage;
pub mod usage;

pub use connect::connect_sqlite;
pub use file_store::FileMatchStore;
pub use match_store::MatchStateStore;
pub use sqlite_store::SqliteMatchStore;
pub use sqlite_usage::SqliteUsageLedger;
pub use usage::{Bucket, MemoryUsageLedger, PollClaim, UsageLedger, UsageSnapshot};
