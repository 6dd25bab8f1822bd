use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::engine::difficulty::{Difficulty, DifficultyTable};
use crate::engine::queue::{self, QueueEntry};
use crate::engine::shuffle::{RandomSource, SmallRngSource};
use crate::error::{DrillError, Result};
use crate::session::result::{ItemTally, SessionResult};

const REGEN_FRACTION: f64 = 0.10;
const MIN_REGEN_THRESHOLD: u32 = 5;
const MAX_REGEN_THRESHOLD: u32 = 20;
/// A missed entry comes back within this many slots.
const REQUEUE_WINDOW: usize = 5;
/// The queue never grows past this multiple of the original target.
const MAX_QUEUE_GROWTH: usize = 3;

/// Maps a drill item to the stable key used for per-item tallies.
pub type KeyResolver<T> = Box<dyn Fn(&T) -> String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Configuring,
    Active,
    Finished,
}

/// Labels carried through to the session result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionMeta {
    pub category: String,
    pub game_mode: String,
    pub selected_labels: Vec<String>,
}

/// What a single answer did, for transient feedback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub requeued: bool,
    pub life_gained: bool,
    pub finished: bool,
}

pub struct SessionState<T> {
    pub queue: Vec<QueueEntry<T>>,
    pub cursor: usize,
    pub lives: u32,
    pub max_lives: u32,
    pub regenerates: bool,
    pub correct_since_regen: u32,
    pub regen_threshold: u32,
    pub lives_regenerated: u32,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub per_item: BTreeMap<String, ItemTally>,
    pub latencies_ms: Vec<f64>,
    pub difficulty: Difficulty,
    pub repetitions: u32,
    pub item_count: usize,
    /// `item_count * repetitions`, fixed at start and unaffected by requeues.
    pub target_count: usize,
    pub started_at: Option<Instant>,
    pub last_answer_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub completed: bool,
    pub phase: Phase,
}

impl<T> SessionState<T> {
    pub fn new() -> Self {
        Self {
            queue: Vec::new(),
            cursor: 0,
            lives: 0,
            max_lives: 0,
            regenerates: false,
            correct_since_regen: 0,
            regen_threshold: MIN_REGEN_THRESHOLD,
            lives_regenerated: 0,
            correct_count: 0,
            wrong_count: 0,
            current_streak: 0,
            best_streak: 0,
            per_item: BTreeMap::new(),
            latencies_ms: Vec::new(),
            difficulty: Difficulty::Normal,
            repetitions: 1,
            item_count: 0,
            target_count: 0,
            started_at: None,
            last_answer_at: None,
            finished_at: None,
            completed: false,
            phase: Phase::Configuring,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end.duration_since(start).as_secs_f64(),
            (Some(start), None) => start.elapsed().as_secs_f64(),
            _ => 0.0,
        }
    }

    pub fn progress(&self) -> f64 {
        if self.target_count == 0 {
            return 0.0;
        }
        (self.correct_count as f64 / self.target_count as f64).clamp(0.0, 1.0)
    }

    /// Entries left to present, including the current one.
    pub fn remaining(&self) -> usize {
        self.queue.len().saturating_sub(self.cursor)
    }
}

impl<T> Default for SessionState<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub fn regen_threshold(queue_len: usize) -> u32 {
    let raw = (queue_len as f64 * REGEN_FRACTION).ceil() as u32;
    raw.clamp(MIN_REGEN_THRESHOLD, MAX_REGEN_THRESHOLD)
}

/// One timed drill session: `Configuring -> Active -> Finished`.
///
/// Every event reads and writes the single `SessionState` aggregate, so
/// termination, requeue and regeneration are always decided against one
/// consistent snapshot. A finished session is never restarted.
pub struct DrillSession<T> {
    state: SessionState<T>,
    meta: SessionMeta,
    rules: DifficultyTable,
    resolve_key: KeyResolver<T>,
    rng: Box<dyn RandomSource>,
    result: Option<SessionResult>,
}

impl<T: Clone> DrillSession<T> {
    pub fn new(meta: SessionMeta, resolve_key: impl Fn(&T) -> String + 'static) -> Self {
        Self {
            state: SessionState::new(),
            meta,
            rules: DifficultyTable::default(),
            resolve_key: Box::new(resolve_key),
            rng: Box::new(SmallRngSource::from_entropy()),
            result: None,
        }
    }

    pub fn with_rules(mut self, rules: DifficultyTable) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_random(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn state(&self) -> &SessionState<T> {
        &self.state
    }

    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Entry currently being presented, if the session is active.
    pub fn current(&self) -> Option<&QueueEntry<T>> {
        if self.state.phase != Phase::Active {
            return None;
        }
        self.state.queue.get(self.state.cursor)
    }

    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<SessionResult> {
        self.result
    }

    pub fn start(&mut self, items: &[T], difficulty: Difficulty, repetitions: u32) -> Result<()> {
        self.start_at(items, difficulty, repetitions, Instant::now())
    }

    pub fn start_at(
        &mut self,
        items: &[T],
        difficulty: Difficulty,
        repetitions: u32,
        now: Instant,
    ) -> Result<()> {
        if self.state.phase != Phase::Configuring {
            return Err(DrillError::InvalidState(format!(
                "cannot start a session in phase {:?}",
                self.state.phase
            )));
        }
        if items.is_empty() {
            return Err(DrillError::EmptyQueue);
        }
        let rule = self.rules.rule(difficulty);
        if rule.starting_lives == 0 {
            return Err(DrillError::InvalidConfig(format!(
                "difficulty {difficulty} starts with no lives"
            )));
        }
        let queue = queue::generate(items, repetitions, self.rng.as_mut())?;

        let target_count = queue.len();
        let mut state = SessionState::new();
        state.regen_threshold = regen_threshold(target_count);
        state.queue = queue;
        state.lives = rule.starting_lives;
        state.max_lives = rule.starting_lives;
        state.regenerates = rule.regenerates;
        state.difficulty = difficulty;
        state.repetitions = repetitions;
        state.item_count = items.len();
        state.target_count = target_count;
        state.started_at = Some(now);
        state.phase = Phase::Active;
        self.state = state;

        debug!(
            category = %self.meta.category,
            %difficulty,
            repetitions,
            queue_len = target_count,
            lives = rule.starting_lives,
            "session started"
        );
        Ok(())
    }

    pub fn submit_answer(&mut self, correct: bool) -> Result<AnswerOutcome> {
        self.submit_answer_at(correct, Instant::now())
    }

    pub fn submit_answer_at(&mut self, correct: bool, now: Instant) -> Result<AnswerOutcome> {
        if self.state.phase != Phase::Active {
            return Err(DrillError::InvalidState(format!(
                "cannot answer in phase {:?}",
                self.state.phase
            )));
        }
        let cursor = self.state.cursor;
        let Some(entry) = self.state.queue.get(cursor) else {
            return Err(DrillError::InvalidState(
                "no entry at the cursor".to_string(),
            ));
        };
        let key = (self.resolve_key)(&entry.item);

        self.record_latency(now);

        let mut outcome = AnswerOutcome::default();
        let state = &mut self.state;
        let tally = state.per_item.entry(key).or_default();

        if correct {
            tally.correct += 1;
            state.correct_count += 1;
            state.current_streak += 1;
            state.best_streak = state.best_streak.max(state.current_streak);

            if state.regenerates && state.lives < state.max_lives {
                state.correct_since_regen += 1;
                if state.correct_since_regen >= state.regen_threshold {
                    state.lives = (state.lives + 1).min(state.max_lives);
                    state.correct_since_regen = 0;
                    state.lives_regenerated += 1;
                    outcome.life_gained = true;
                }
            }

            if state.correct_count as usize >= state.target_count {
                outcome.finished = true;
                self.finish(true, now);
                return Ok(outcome);
            }
        } else {
            tally.wrong += 1;
            state.wrong_count += 1;
            state.current_streak = 0;
            state.correct_since_regen = 0;
            state.lives = state.lives.saturating_sub(1);

            if state.lives == 0 {
                outcome.finished = true;
                self.finish(false, now);
                return Ok(outcome);
            }

            if state.queue.len() < state.target_count * MAX_QUEUE_GROWTH {
                let low = cursor + 1;
                let high = (cursor + REQUEUE_WINDOW).min(state.queue.len()).max(low);
                let at = self.rng.next_in_range(low, high);
                let retry = state.queue[cursor].clone();
                state.queue.insert(at, retry);
                queue::renumber(&mut state.queue);
                outcome.requeued = true;
            }
        }

        state.cursor += 1;

        // Only reachable once the growth cap has dropped a retry.
        if state.cursor >= state.queue.len() {
            outcome.finished = true;
            self.finish(false, now);
        }
        Ok(outcome)
    }

    /// End an active session early. The result is produced but not persisted;
    /// callers that want to discard it simply don't save it.
    pub fn cancel(&mut self) -> Result<SessionResult> {
        self.cancel_at(Instant::now())
    }

    pub fn cancel_at(&mut self, now: Instant) -> Result<SessionResult> {
        if self.state.phase != Phase::Active {
            return Err(DrillError::InvalidState(format!(
                "cannot cancel in phase {:?}",
                self.state.phase
            )));
        }
        Ok(self.finish(false, now))
    }

    fn record_latency(&mut self, now: Instant) {
        let previous = self.state.last_answer_at.or(self.state.started_at);
        let Some(previous) = previous else {
            self.state.last_answer_at = Some(now);
            return;
        };
        // Clock quantization can produce zero or backwards deltas; drop them.
        if let Some(delta) = now.checked_duration_since(previous) {
            if !delta.is_zero() {
                self.state.latencies_ms.push(delta.as_secs_f64() * 1000.0);
            }
            self.state.last_answer_at = Some(now);
        }
    }

    fn finish(&mut self, completed: bool, now: Instant) -> SessionResult {
        self.state.phase = Phase::Finished;
        self.state.completed = completed;
        self.state.finished_at = Some(now);

        let result = SessionResult::from_session(&self.state, &self.meta, Utc::now());
        info!(
            category = %result.category,
            completed,
            correct = result.correct_count,
            wrong = result.wrong_count,
            total_time_ms = result.total_time_ms,
            "session finished"
        );
        self.result = Some(result.clone());
        result
    }
}
