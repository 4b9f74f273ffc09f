//! Bounded, insertion-ordered history stores.
//!
//! Each stream (samples, change events, snapshots) keeps only its most recent
//! `capacity` items. Appending at capacity evicts the oldest item; there is no
//! priority and no duplicate suppression.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::events::ChangeEventCard;
use crate::snapshot::PreChangeSnapshot;
use crate::types::MetricSample;

// ── Bounded History ─────────────────────────────────────────────────────

/// Fixed-capacity FIFO store.
#[derive(Clone, Debug)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedHistory<T> {
    /// Create a store holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Append an item, evicting the oldest one when full.
    pub fn append(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    /// Most recently appended item.
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    /// The newest `n` items, oldest first.
    pub fn tail(&self, n: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

// ── Stream Sizing ───────────────────────────────────────────────────────

fn default_metric_horizon_secs() -> u64 {
    7 * 24 * 3600
}

fn default_event_capacity() -> usize {
    500
}

fn default_snapshot_capacity() -> usize {
    500
}

/// Capacity settings for the three history streams.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryCapacity {
    /// How far back metric samples are retained.
    #[serde(default = "default_metric_horizon_secs")]
    pub metric_horizon_secs: u64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default = "default_snapshot_capacity")]
    pub snapshot_capacity: usize,
}

impl Default for HistoryCapacity {
    fn default() -> Self {
        Self {
            metric_horizon_secs: default_metric_horizon_secs(),
            event_capacity: default_event_capacity(),
            snapshot_capacity: default_snapshot_capacity(),
        }
    }
}

impl HistoryCapacity {
    /// Number of sample slots needed to cover the horizon at `interval`.
    pub fn metric_capacity(&self, interval: Duration) -> usize {
        let step = interval.as_secs().max(1);
        (self.metric_horizon_secs / step).max(1) as usize
    }
}

/// The three history streams fed by the sampling loop.
#[derive(Clone, Debug)]
pub struct HistoryStores {
    pub metrics: BoundedHistory<MetricSample>,
    pub events: BoundedHistory<ChangeEventCard>,
    pub snapshots: BoundedHistory<PreChangeSnapshot>,
}

impl HistoryStores {
    pub fn new(capacity: &HistoryCapacity, interval: Duration) -> Self {
        Self {
            metrics: BoundedHistory::new(capacity.metric_capacity(interval)),
            events: BoundedHistory::new(capacity.event_capacity),
            snapshots: BoundedHistory::new(capacity.snapshot_capacity),
        }
    }

    /// Point-in-time copy of all three streams.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            metrics: self.metrics.snapshot(),
            events: self.events.snapshot(),
            snapshots: self.snapshots.snapshot(),
        }
    }
}

/// Immutable copy of the history streams taken at one instant.
#[derive(Clone, Debug, Default)]
pub struct HistorySnapshot {
    pub metrics: Vec<MetricSample>,
    pub events: Vec<ChangeEventCard>,
    pub snapshots: Vec<PreChangeSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_snapshot_in_insertion_order() {
        let mut h = BoundedHistory::new(5);
        h.append(1);
        h.append(2);
        h.append(3);
        assert_eq!(h.snapshot(), vec![1, 2, 3]);
        assert_eq!(h.last(), Some(&3));
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut h = BoundedHistory::new(3);
        for i in 1..=5 {
            h.append(i);
        }
        assert_eq!(h.snapshot(), vec![3, 4, 5]);
        assert_eq!(h.len(), 3);
        assert_eq!(h.capacity(), 3);
    }

    #[test]
    fn keeps_duplicates_distinct() {
        let mut h = BoundedHistory::new(4);
        h.append("same");
        h.append("same");
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn empty_store_has_no_last() {
        let h: BoundedHistory<u8> = BoundedHistory::new(2);
        assert!(h.last().is_none());
        assert!(h.is_empty());
        assert!(h.snapshot().is_empty());
    }

    #[test]
    fn zero_capacity_clamped_to_one() {
        let mut h = BoundedHistory::new(0);
        h.append(1);
        h.append(2);
        assert_eq!(h.snapshot(), vec![2]);
    }

    #[test]
    fn tail_returns_newest_items() {
        let mut h = BoundedHistory::new(10);
        for i in 0..6 {
            h.append(i);
        }
        assert_eq!(h.tail(2), vec![4, 5]);
        assert_eq!(h.tail(100).len(), 6);
    }

    #[test]
    fn snapshot_is_detached_from_store() {
        let mut h = BoundedHistory::new(3);
        h.append(1);
        let snap = h.snapshot();
        h.append(2);
        assert_eq!(snap, vec![1]);
    }

    #[test]
    fn metric_capacity_covers_seven_days() {
        let cap = HistoryCapacity::default();
        assert_eq!(cap.metric_capacity(Duration::from_secs(10)), 60_480);
        assert_eq!(cap.metric_capacity(Duration::from_millis(0)), 604_800);
    }

    #[test]
    fn clear_empties_store() {
        let mut h = BoundedHistory::new(3);
        h.append(1);
        h.clear();
        assert!(h.is_empty());
    }
}
