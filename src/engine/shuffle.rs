use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::{DrillError, Result};

/// The single random primitive every shuffle and requeue decision goes through.
pub trait RandomSource {
    /// Uniform integer in `low..=high`. Callers guarantee `low <= high`.
    fn next_in_range(&mut self, low: usize, high: usize) -> usize;
}

/// Production randomness backed by a `SmallRng`.
pub struct SmallRngSource {
    rng: SmallRng,
}

impl SmallRngSource {
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SmallRngSource {
    fn next_in_range(&mut self, low: usize, high: usize) -> usize {
        self.rng.gen_range(low..=high)
    }
}

/// Fisher-Yates over a copy: for `i` from the last index down to 1, swap
/// element `i` with a uniformly chosen index in `0..=i`.
pub fn shuffle<T: Clone>(items: &[T], rng: &mut dyn RandomSource) -> Vec<T> {
    let mut out = items.to_vec();
    for i in (1..out.len()).rev() {
        let j = rng.next_in_range(0, i);
        out.swap(i, j);
    }
    out
}

pub fn pick_one<'a, T>(items: &'a [T], rng: &mut dyn RandomSource) -> Result<&'a T> {
    if items.is_empty() {
        return Err(DrillError::EmptyInput);
    }
    let idx = rng.next_in_range(0, items.len() - 1);
    Ok(&items[idx])
}

#[cfg(test)]
pub(crate) mod testing {
    use super::RandomSource;

    /// Always answers with the lowest value in range.
    pub struct LowestRandom;

    impl RandomSource for LowestRandom {
        fn next_in_range(&mut self, low: usize, _high: usize) -> usize {
            low
        }
    }

    /// Always answers with the highest value in range.
    pub struct HighestRandom;

    impl RandomSource for HighestRandom {
        fn next_in_range(&mut self, _low: usize, high: usize) -> usize {
            high
        }
    }
}
