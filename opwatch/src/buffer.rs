//! Fixed capacity, insertion ordered storage for recent metrics.
//!
//! The buffer is a FIFO ring: appends go to the back and once the buffer is
//! over capacity the oldest entries fall off the front.

use std::{collections::VecDeque, num::NonZeroUsize};

use crate::metric::QueryMetric;

/// Default retention of the buffer.
pub const MAX_METRICS: usize = 100;
/// Default number of entries returned by [`MetricsBuffer::recent`] callers.
pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// The most recent [`QueryMetric`] records, oldest first.
#[derive(Debug, Clone)]
pub struct MetricsBuffer {
    entries: VecDeque<QueryMetric>,
    capacity: NonZeroUsize,
}

impl MetricsBuffer {
    /// Create an empty buffer holding at most `capacity` metrics.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.get()),
            capacity,
        }
    }

    /// Add `metric` as the newest entry, evicting the oldest entries while the
    /// buffer is over capacity.
    pub fn append(&mut self, metric: QueryMetric) {
        self.entries.push_back(metric);
        while self.entries.len() > self.capacity.get() {
            self.entries.pop_front();
        }
    }

    /// The newest `limit` entries in insertion order, fewer if the buffer holds
    /// fewer.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<QueryMetric> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &QueryMetric> {
        self.entries.iter()
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries held.
    #[must_use]
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }
}

impl<'a> IntoIterator for &'a MetricsBuffer {
    type Item = &'a QueryMetric;
    type IntoIter = std::collections::vec_deque::Iter<'a, QueryMetric>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opwatch_link::OperationKind;
    use proptest::prelude::*;

    fn metric(i: usize) -> QueryMetric {
        QueryMetric::start(format!("op{i}"), OperationKind::Query, false, 0.0)
    }

    fn names(metrics: &[QueryMetric]) -> Vec<String> {
        metrics.iter().map(|m| m.operation_name.clone()).collect()
    }

    fn default_buffer() -> MetricsBuffer {
        MetricsBuffer::new(NonZeroUsize::new(MAX_METRICS).unwrap())
    }

    #[test]
    fn keeps_newest_hundred_in_order() {
        let mut buffer = default_buffer();
        for i in 0..150 {
            buffer.append(metric(i));
        }
        assert_eq!(buffer.len(), MAX_METRICS);
        let all = buffer.recent(usize::MAX);
        let expected: Vec<String> = (50..150).map(|i| format!("op{i}")).collect();
        assert_eq!(names(&all), expected);
    }

    #[test]
    fn recent_returns_tail_in_insertion_order() {
        let mut buffer = default_buffer();
        for i in 0..30 {
            buffer.append(metric(i));
        }
        let recent = buffer.recent(DEFAULT_RECENT_LIMIT);
        assert_eq!(recent.len(), DEFAULT_RECENT_LIMIT);
        assert_eq!(recent.first().unwrap().operation_name, "op10");
        assert_eq!(recent.last().unwrap().operation_name, "op29");
        assert_eq!(names(&buffer.recent(1)), vec!["op29".to_string()]);
        assert!(buffer.recent(0).is_empty());
    }

    #[test]
    fn recent_larger_than_buffer_returns_everything() {
        let mut buffer = default_buffer();
        buffer.append(metric(0));
        buffer.append(metric(1));
        assert_eq!(names(&buffer.recent(20)), vec!["op0", "op1"]);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut buffer = default_buffer();
        buffer.clear();
        assert!(buffer.is_empty());
        buffer.append(metric(0));
        buffer.clear();
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.recent(DEFAULT_RECENT_LIMIT).is_empty());
        assert_eq!(buffer.capacity().get(), MAX_METRICS);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity_and_keeps_newest(capacity in 1usize..64, appends in 0usize..256) {
            let mut buffer = MetricsBuffer::new(NonZeroUsize::new(capacity).unwrap());
            for i in 0..appends {
                buffer.append(metric(i));
                prop_assert!(buffer.len() <= capacity);
            }

            let held = buffer.iter().map(|m| m.operation_name.clone()).collect::<Vec<_>>();
            let expected = (appends.saturating_sub(capacity)..appends)
                .map(|i| format!("op{i}"))
                .collect::<Vec<_>>();
            prop_assert_eq!(held, expected);
        }
    }
}
