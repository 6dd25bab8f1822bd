use crate::engine::shuffle::{RandomSource, shuffle};
use crate::error::{DrillError, Result};

/// One scheduled attempt at a drill item.
#[derive(Clone, Debug, PartialEq)]
pub struct QueueEntry<T> {
    pub item: T,
    pub queue_position: usize,
    pub repetition_number: u32,
}

/// Expand `items` into `repetitions` tagged copies each, shuffle the whole
/// concatenation, then number positions in final order.
pub fn generate<T: Clone>(
    items: &[T],
    repetitions: u32,
    rng: &mut dyn RandomSource,
) -> Result<Vec<QueueEntry<T>>> {
    if repetitions < 1 {
        return Err(DrillError::InvalidConfig(format!(
            "repetitions must be at least 1, got {repetitions}"
        )));
    }

    let mut entries = Vec::with_capacity(items.len() * repetitions as usize);
    for item in items {
        for rep in 1..=repetitions {
            entries.push(QueueEntry {
                item: item.clone(),
                queue_position: 0,
                repetition_number: rep,
            });
        }
    }

    let mut queue = shuffle(&entries, rng);
    renumber(&mut queue);
    Ok(queue)
}

pub fn renumber<T>(queue: &mut [QueueEntry<T>]) {
    for (i, entry) in queue.iter_mut().enumerate() {
        entry.queue_position = i;
    }
}
