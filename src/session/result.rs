use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::difficulty::Difficulty;
use crate::session::drill::{SessionMeta, SessionState};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTally {
    pub correct: u32,
    pub wrong: u32,
}

/// Immutable snapshot of a finished session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Empty until the stats store assigns one on save.
    #[serde(default)]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub category: String,
    #[serde(default = "default_game_mode")]
    pub game_mode: String,
    pub difficulty: Difficulty,
    pub repetitions_per_item: u32,
    pub total_items: usize,
    #[serde(default)]
    pub selected_labels: Vec<String>,
    pub completed: bool,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub accuracy: f64,
    pub best_streak: u32,
    pub average_latency_ms: f64,
    pub fastest_latency_ms: f64,
    pub slowest_latency_ms: f64,
    pub lives_lost: u32,
    #[serde(default)]
    pub lives_regenerated: u32,
    pub final_lives: u32,
    pub max_lives: u32,
    pub total_time_ms: u64,
    #[serde(default)]
    pub per_item: BTreeMap<String, ItemTally>,
}

fn default_game_mode() -> String {
    "typing".to_string()
}

impl SessionResult {
    /// Reduce the session counters into a result record.
    pub fn from_session<T>(
        state: &SessionState<T>,
        meta: &SessionMeta,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let answered = state.correct_count + state.wrong_count;
        let accuracy = if answered > 0 {
            state.correct_count as f64 / answered as f64
        } else {
            0.0
        };

        let latencies = &state.latencies_ms;
        let (average, fastest, slowest) = if latencies.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let sum: f64 = latencies.iter().sum();
            let fastest = latencies.iter().copied().fold(f64::INFINITY, f64::min);
            let slowest = latencies.iter().copied().fold(0.0, f64::max);
            (sum / latencies.len() as f64, fastest, slowest)
        };

        // Counts every hit taken, including ones later healed by regeneration.
        let lives_lost = (state.max_lives + state.lives_regenerated).saturating_sub(state.lives);

        let total_time_ms = match (state.started_at, state.finished_at) {
            (Some(start), Some(end)) => end.saturating_duration_since(start).as_millis() as u64,
            _ => 0,
        };

        Self {
            id: String::new(),
            timestamp,
            category: meta.category.clone(),
            game_mode: meta.game_mode.clone(),
            difficulty: state.difficulty,
            repetitions_per_item: state.repetitions,
            total_items: state.item_count,
            selected_labels: meta.selected_labels.clone(),
            completed: state.completed,
            correct_count: state.correct_count,
            wrong_count: state.wrong_count,
            accuracy,
            best_streak: state.best_streak,
            average_latency_ms: average,
            fastest_latency_ms: fastest,
            slowest_latency_ms: slowest,
            lives_lost,
            lives_regenerated: state.lives_regenerated,
            final_lives: state.lives,
            max_lives: state.max_lives,
            total_time_ms,
            per_item: state.per_item.clone(),
        }
    }

    /// Item keys answered wrong at least once, most-missed first.
    pub fn missed_items(&self) -> Vec<(&str, u32)> {
        let mut missed: Vec<(&str, u32)> = self
            .per_item
            .iter()
            .filter(|(_, tally)| tally.wrong > 0)
            .map(|(key, tally)| (key.as_str(), tally.wrong))
            .collect();
        missed.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        missed
    }
}
