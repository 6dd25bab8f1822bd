use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::difficulty::Difficulty;
use crate::session::result::SessionResult;

pub const SCHEMA_VERSION: u32 = 2;
pub const MAX_SESSIONS: usize = 100;

/// Running sums for one category. Never reduced when history is trimmed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeTotals {
    pub total_sessions: u32,
    pub completed_sessions: u32,
    pub total_correct: u64,
    pub total_wrong: u64,
    pub best_streak: u32,
}

impl LifetimeTotals {
    pub fn accumulate(&mut self, result: &SessionResult) {
        self.total_sessions += 1;
        if result.completed {
            self.completed_sessions += 1;
        }
        self.total_correct += u64::from(result.correct_count);
        self.total_wrong += u64::from(result.wrong_count);
        self.best_streak = self.best_streak.max(result.best_streak);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OverallStats {
    pub totals: LifetimeTotals,
    /// Fastest completed run among the retained sessions only. Once old
    /// sessions age out this can be slower than the stored best times.
    pub fastest_time_ms: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredStatsBlob {
    pub schema_version: u32,
    /// Most recent first.
    pub sessions: Vec<SessionResult>,
    pub best_times: BTreeMap<String, u64>,
    pub lifetime_totals: BTreeMap<String, LifetimeTotals>,
}

impl Default for StoredStatsBlob {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            sessions: Vec::new(),
            best_times: BTreeMap::new(),
            lifetime_totals: BTreeMap::new(),
        }
    }
}

/// On-disk shape before validation. Older blobs of the current version were
/// written without `lifetime_totals`.
#[derive(Debug, Deserialize)]
pub struct RawStatsBlob {
    pub schema_version: u32,
    #[serde(default)]
    pub sessions: Vec<SessionResult>,
    #[serde(default)]
    pub best_times: BTreeMap<String, u64>,
    pub lifetime_totals: Option<BTreeMap<String, LifetimeTotals>>,
}

pub fn config_key(
    category: &str,
    difficulty: Difficulty,
    repetitions: u32,
    game_mode: &str,
    item_count: usize,
) -> String {
    format!("{category}:{difficulty}:{repetitions}:{game_mode}:{item_count}")
}

fn result_key(result: &SessionResult) -> String {
    config_key(
        &result.category,
        result.difficulty,
        result.repetitions_per_item,
        &result.game_mode,
        result.total_items,
    )
}

impl StoredStatsBlob {
    /// Validate a raw blob. Returns `None` for an unrecognized schema version.
    pub fn from_raw(raw: RawStatsBlob) -> Option<Self> {
        if raw.schema_version != SCHEMA_VERSION {
            return None;
        }
        let mut blob = Self {
            schema_version: raw.schema_version,
            sessions: raw.sessions,
            best_times: raw.best_times,
            lifetime_totals: BTreeMap::new(),
        };
        match raw.lifetime_totals {
            Some(totals) => blob.lifetime_totals = totals,
            None => blob.backfill_lifetime_totals(),
        }
        Some(blob)
    }

    /// Rebuild lifetime totals by replaying retained sessions oldest-first.
    /// Leaves `sessions` and `best_times` untouched.
    pub fn backfill_lifetime_totals(&mut self) {
        self.lifetime_totals.clear();
        for result in self.sessions.iter().rev() {
            self.lifetime_totals
                .entry(result.category.clone())
                .or_default()
                .accumulate(result);
        }
    }

    /// Merge an identified result. Returns true when it set a new best time.
    pub fn record(&mut self, result: SessionResult) -> bool {
        self.lifetime_totals
            .entry(result.category.clone())
            .or_default()
            .accumulate(&result);

        let mut is_new_best = false;
        if result.completed {
            let key = result_key(&result);
            let previous = self.best_times.get(&key).copied();
            if previous.is_none_or(|best| result.total_time_ms < best) {
                self.best_times.insert(key, result.total_time_ms);
                is_new_best = true;
            }
        }

        self.sessions.insert(0, result);
        self.sessions.truncate(MAX_SESSIONS);
        is_new_best
    }

    pub fn history(&self, category: &str, limit: usize) -> Vec<SessionResult> {
        self.sessions
            .iter()
            .filter(|r| r.category == category)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn best_time(
        &self,
        category: &str,
        difficulty: Difficulty,
        repetitions: u32,
        game_mode: &str,
        item_count: usize,
    ) -> Option<u64> {
        let key = config_key(category, difficulty, repetitions, game_mode, item_count);
        self.best_times.get(&key).copied()
    }

    /// Completed sessions for a category, fastest first.
    pub fn leaderboard(
        &self,
        category: &str,
        difficulty: Option<Difficulty>,
        limit: usize,
    ) -> Vec<SessionResult> {
        let mut board: Vec<SessionResult> = self
            .sessions
            .iter()
            .filter(|r| r.completed && r.category == category)
            .filter(|r| difficulty.is_none_or(|d| r.difficulty == d))
            .cloned()
            .collect();
        board.sort_by_key(|r| r.total_time_ms);
        board.truncate(limit);
        board
    }

    pub fn overall_stats(&self, category: &str) -> OverallStats {
        let totals = self
            .lifetime_totals
            .get(category)
            .copied()
            .unwrap_or_default();
        let fastest_time_ms = self
            .sessions
            .iter()
            .filter(|r| r.completed && r.category == category)
            .map(|r| r.total_time_ms)
            .min();
        OverallStats {
            totals,
            fastest_time_ms,
        }
    }
}
