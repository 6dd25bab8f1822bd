pub mod backend;
pub mod schema;
pub mod stats_store;

pub use backend::{JsonFileBackend, MemoryBackend, StorageBackend};
pub use schema::{LifetimeTotals, OverallStats, StoredStatsBlob};
pub use stats_store::{STATS_KEY, SaveOutcome, StatsStore};
