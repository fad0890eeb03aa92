use chrono::{DateTime, Utc};

use crate::{DatasetId, MAX_DATASETS};

/// What the retention check needs to know about a committed dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionSlot {
    pub id: DatasetId,
    pub created_at: DateTime<Utc>,
}

/// Bounded-collection admission policy.
///
/// Stores call [`RetentionPolicy::admit`] inside the critical section that
/// commits a new dataset and delete whatever it returns in the same unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    capacity: usize,
}

impl RetentionPolicy {
    /// A capacity of zero is treated as one: the incoming dataset is always kept.
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the datasets to evict so that `stored` plus one newcomer fits.
    ///
    /// `stored` must not include the newcomer. Oldest go first; equal
    /// timestamps are ordered by id.
    pub fn admit(&self, stored: &[RetentionSlot]) -> Vec<DatasetId> {
        if stored.len() < self.capacity {
            return vec![];
        }
        let excess = stored.len() + 1 - self.capacity;

        let mut by_age = stored.to_vec();
        by_age.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        by_age.into_iter().take(excess).map(|s| s.id).collect()
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(MAX_DATASETS)
    }
}
