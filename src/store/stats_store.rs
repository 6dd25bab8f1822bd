use chrono::Utc;
use tracing::{debug, info, warn};

use crate::engine::difficulty::Difficulty;
use crate::engine::shuffle::{RandomSource, SmallRngSource};
use crate::session::result::SessionResult;
use crate::store::backend::StorageBackend;
use crate::store::schema::{OverallStats, RawStatsBlob, StoredStatsBlob};

/// Single fixed key the whole stats blob is stored under.
pub const STATS_KEY: &str = "drill_stats";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveOutcome {
    pub id: String,
    pub is_new_best: bool,
    /// False when the write failed. The failure is logged, never raised.
    pub persisted: bool,
}

/// Best-effort, single-writer stats persistence.
///
/// Read failures fall back to a fresh blob and write failures are logged;
/// gameplay never depends on either succeeding. Two racing `save` calls
/// resolve as last-write-wins.
pub struct StatsStore<B: StorageBackend> {
    backend: B,
    rng: SmallRngSource,
}

impl<B: StorageBackend> StatsStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            rng: SmallRngSource::from_entropy(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn load(&self) -> StoredStatsBlob {
        self.read().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read stats, starting fresh");
            StoredStatsBlob::default()
        })
    }

    /// Like `load`, but a backend read failure is returned instead of
    /// replaced with a fresh blob. Unparseable or unrecognized content still
    /// loads as fresh.
    fn read(&self) -> anyhow::Result<StoredStatsBlob> {
        let Some(content) = self.backend.get(STATS_KEY)? else {
            return Ok(StoredStatsBlob::default());
        };

        let raw: RawStatsBlob = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "stored stats are unreadable, starting fresh");
                return Ok(StoredStatsBlob::default());
            }
        };

        let version = raw.schema_version;
        let migrating = raw.lifetime_totals.is_none();
        match StoredStatsBlob::from_raw(raw) {
            Some(blob) => {
                if migrating {
                    info!(
                        sessions = blob.sessions.len(),
                        "backfilled lifetime totals from session history"
                    );
                }
                Ok(blob)
            }
            None => {
                info!(version, "unrecognized stats schema version, starting fresh");
                Ok(StoredStatsBlob::default())
            }
        }
    }

    pub fn save(&mut self, mut result: SessionResult) -> SaveOutcome {
        result.id = self.next_id();
        let id = result.id.clone();

        // Writing after a failed read would replace the stored history with
        // this one session, so the write is skipped instead.
        let (mut blob, readable) = match self.read() {
            Ok(blob) => (blob, true),
            Err(e) => {
                warn!(
                    error = %e,
                    %id,
                    "failed to read stats, not overwriting stored history"
                );
                (StoredStatsBlob::default(), false)
            }
        };
        let is_new_best = blob.record(result);
        if is_new_best {
            info!(%id, "new best time");
        }

        let persisted = readable
            && match self.write(&blob) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, %id, "failed to save session stats");
                    false
                }
            };
        debug!(%id, is_new_best, persisted, "session saved");

        SaveOutcome {
            id,
            is_new_best,
            persisted,
        }
    }

    pub fn history(&self, category: &str, limit: usize) -> Vec<SessionResult> {
        self.load().history(category, limit)
    }

    pub fn best_time(
        &self,
        category: &str,
        difficulty: Difficulty,
        repetitions: u32,
        game_mode: &str,
        item_count: usize,
    ) -> Option<u64> {
        self.load()
            .best_time(category, difficulty, repetitions, game_mode, item_count)
    }

    pub fn leaderboard(
        &self,
        category: &str,
        difficulty: Option<Difficulty>,
        limit: usize,
    ) -> Vec<SessionResult> {
        self.load().leaderboard(category, difficulty, limit)
    }

    pub fn overall_stats(&self, category: &str) -> OverallStats {
        self.load().overall_stats(category)
    }

    pub fn clear(&self) {
        if let Err(e) = self.backend.remove(STATS_KEY) {
            warn!(error = %e, "failed to clear stats");
        }
    }

    fn write(&self, blob: &StoredStatsBlob) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(blob)?;
        self.backend.set(STATS_KEY, &json)
    }

    /// Millisecond timestamp plus a random suffix. Unique in practice, not
    /// guaranteed.
    fn next_id(&mut self) -> String {
        let suffix = self.rng.next_in_range(0, 0xff_ffff);
        format!("{}-{suffix:06x}", Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};

    use anyhow::bail;

    use super::*;
    use crate::store::backend::MemoryBackend;
    use crate::store::schema::{MAX_SESSIONS, SCHEMA_VERSION};

    struct FailingBackend;

    impl StorageBackend for FailingBackend {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            bail!("disk on fire")
        }
        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            bail!("disk on fire")
        }
        fn remove(&self, _key: &str) -> anyhow::Result<()> {
            bail!("disk on fire")
        }
    }

    /// In-memory backend whose reads can be switched off.
    struct FlakyReadBackend {
        inner: MemoryBackend,
        reads_fail: AtomicBool,
    }

    impl StorageBackend for FlakyReadBackend {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            if self.reads_fail.load(Ordering::SeqCst) {
                bail!("read timed out");
            }
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.inner.remove(key)
        }
    }

    fn result(category: &str, completed: bool, total_time_ms: u64) -> SessionResult {
        SessionResult {
            id: String::new(),
            timestamp: Utc::now(),
            category: category.to_string(),
            game_mode: "typing".to_string(),
            difficulty: Difficulty::Easy,
            repetitions_per_item: 1,
            total_items: 3,
            selected_labels: vec!["a-row".to_string()],
            completed,
            correct_count: 3,
            wrong_count: 1,
            accuracy: 0.75,
            best_streak: 3,
            average_latency_ms: 1000.0,
            fastest_latency_ms: 800.0,
            slowest_latency_ms: 1200.0,
            lives_lost: 1,
            lives_regenerated: 0,
            final_lives: 4,
            max_lives: 5,
            total_time_ms,
            per_item: BTreeMap::new(),
        }
    }

    #[test]
    fn test_load_empty_backend_is_default() {
        let store = StatsStore::new(MemoryBackend::new());
        assert_eq!(store.load(), StoredStatsBlob::default());
    }

    #[test]
    fn test_load_is_idempotent() {
        let mut store = StatsStore::new(MemoryBackend::new());
        store.save(result("hiragana", true, 4000));
        assert_eq!(store.load(), store.load());
    }

    #[test]
    fn test_save_then_load_reflects_session() {
        let mut store = StatsStore::new(MemoryBackend::new());
        let outcome = store.save(result("hiragana", true, 4000));
        assert!(outcome.persisted);
        assert!(outcome.is_new_best);
        assert!(!outcome.id.is_empty());

        let blob = store.load();
        assert_eq!(blob.sessions[0].id, outcome.id);
        assert_eq!(blob.sessions[0].total_time_ms, 4000);
        assert_eq!(blob.lifetime_totals["hiragana"].total_sessions, 1);
    }

    #[test]
    fn test_ids_are_distinct() {
        let mut store = StatsStore::new(MemoryBackend::new());
        let ids: HashSet<String> = (0..50)
            .map(|_| store.save(result("kanji", false, 1)).id)
            .collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_best_time_is_minimum_of_completed_saves() {
        let mut store = StatsStore::new(MemoryBackend::new());
        let times = [7000, 5000, 9000, 4500, 4500, 6000];
        for t in times {
            store.save(result("katakana", true, t));
        }
        store.save(result("katakana", false, 100));
        assert_eq!(
            store.best_time("katakana", Difficulty::Easy, 1, "typing", 3),
            Some(4500)
        );
    }

    #[test]
    fn test_totals_survive_history_trim() {
        let mut store = StatsStore::new(MemoryBackend::new());
        let n = MAX_SESSIONS + 15;
        for _ in 0..n {
            store.save(result("hiragana", true, 3000));
        }
        let blob = store.load();
        assert_eq!(blob.sessions.len(), MAX_SESSIONS);
        let totals = blob.lifetime_totals["hiragana"];
        assert_eq!(totals.total_sessions as usize, n);
        assert_eq!(totals.completed_sessions as usize, n);
        assert_eq!(totals.total_correct as usize, 3 * n);
        assert_eq!(totals.total_wrong as usize, n);
    }

    #[test]
    fn test_unknown_version_loads_fresh() {
        let backend = MemoryBackend::new();
        backend
            .set(STATS_KEY, r#"{"schema_version": 1, "sessions": []}"#)
            .unwrap();
        let store = StatsStore::new(backend);
        assert_eq!(store.load(), StoredStatsBlob::default());
    }

    #[test]
    fn test_corrupt_blob_loads_fresh() {
        let backend = MemoryBackend::new();
        backend.set(STATS_KEY, "not json").unwrap();
        let store = StatsStore::new(backend);
        assert_eq!(store.load(), StoredStatsBlob::default());
    }

    #[test]
    fn test_legacy_blob_is_backfilled_without_touching_history() {
        let mut store = StatsStore::new(MemoryBackend::new());
        store.save(result("hiragana", true, 3000));
        store.save(result("hiragana", false, 2000));
        store.save(result("kanji", true, 8000));
        let current = store.load();

        let mut legacy = serde_json::to_value(&current).unwrap();
        legacy.as_object_mut().unwrap().remove("lifetime_totals");
        store.backend().set(STATS_KEY, &legacy.to_string()).unwrap();

        let migrated = store.load();
        assert_eq!(migrated.schema_version, SCHEMA_VERSION);
        assert_eq!(migrated.sessions, current.sessions);
        assert_eq!(migrated.best_times, current.best_times);
        assert_eq!(migrated.lifetime_totals, current.lifetime_totals);
        assert_eq!(store.load(), migrated);
    }

    #[test]
    fn test_failing_backend_never_raises() {
        let mut store = StatsStore::new(FailingBackend);
        assert_eq!(store.load(), StoredStatsBlob::default());
        let outcome = store.save(result("hiragana", true, 1000));
        assert!(!outcome.persisted);
        assert!(outcome.is_new_best);
        store.clear();
        assert!(store.history("hiragana", 10).is_empty());
    }

    #[test]
    fn test_save_after_failed_read_keeps_stored_history() {
        let mut store = StatsStore::new(FlakyReadBackend {
            inner: MemoryBackend::new(),
            reads_fail: AtomicBool::new(false),
        });
        let first = store.save(result("hiragana", true, 3000));
        assert!(first.persisted);

        store.backend().reads_fail.store(true, Ordering::SeqCst);
        let second = store.save(result("hiragana", true, 2000));
        assert!(!second.persisted);
        assert!(second.is_new_best);

        store.backend().reads_fail.store(false, Ordering::SeqCst);
        let history = store.history("hiragana", 10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, first.id);
        assert_eq!(
            store.best_time("hiragana", Difficulty::Easy, 1, "typing", 3),
            Some(3000)
        );
    }

    #[test]
    fn test_clear_erases_blob() {
        let mut store = StatsStore::new(MemoryBackend::new());
        store.save(result("hiragana", true, 1000));
        store.clear();
        assert_eq!(store.backend().get(STATS_KEY).unwrap(), None);
        assert!(store.history("hiragana", 10).is_empty());
        assert_eq!(store.overall_stats("hiragana").totals.total_sessions, 0);
    }
}
