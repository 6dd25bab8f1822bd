pub mod difficulty;
pub mod queue;
pub mod shuffle;

pub use difficulty::{Difficulty, DifficultyRule, DifficultyTable};
pub use queue::QueueEntry;
pub use shuffle::{RandomSource, SmallRngSource};
