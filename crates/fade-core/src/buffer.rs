//! Bounded buffer of recent items
//!
//! Used by aggregators whose decay function cannot be rescaled in O(1)
//! (polynomial, fixed window). The decayed aggregate is recomputed from the
//! retained items at query time, so accuracy is traded for memory: once the
//! buffer overflows, the oldest items are dropped and their contribution is
//! lost.

use std::collections::VecDeque;

use crate::decay::DecayFunction;

/// Capacity-bounded FIFO of `(timestamp, value)` pairs
#[derive(Debug, Clone)]
pub struct RecentBuffer {
    entries: VecDeque<(f64, f64)>,
    capacity: usize,
    dropped: u64,
}

impl RecentBuffer {
    /// Create a buffer retaining at most `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    /// Append an item. Items past the decay horizon are pruned first; if the
    /// buffer is still full, the oldest item is dropped.
    pub fn push(&mut self, timestamp: f64, value: f64, decay: &DecayFunction) {
        if let Some(horizon) = decay.horizon() {
            let cutoff = timestamp - horizon;
            while self.entries.front().is_some_and(|(t, _)| *t < cutoff) {
                self.entries.pop_front();
            }
        }

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
            metrics::counter!("fade_fallback_dropped_total").increment(1);
        }

        self.entries.push_back((timestamp, value));
    }

    /// `Σ value · weight(now − t)` over retained items
    pub fn sum(&self, decay: &DecayFunction, now: f64) -> f64 {
        self.entries
            .iter()
            .map(|(t, v)| v * decay.weight(now - t))
            .sum()
    }

    /// `Σ weight(now − t)` over retained items
    pub fn count(&self, decay: &DecayFunction, now: f64) -> f64 {
        self.entries
            .iter()
            .map(|(t, _)| decay.weight(now - t))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items lost to overflow since creation or the last clear
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_drops_oldest() {
        let decay = DecayFunction::polynomial(1.0).unwrap();
        let mut buffer = RecentBuffer::new(2);
        buffer.push(0.0, 10.0, &decay);
        buffer.push(1.0, 1.0, &decay);
        buffer.push(2.0, 1.0, &decay);

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.dropped(), 1);
        // 1·(1+1)^-1 + 1·(0+1)^-1
        assert!((buffer.sum(&decay, 2.0) - 1.5).abs() < 1e-12);
        assert!((buffer.count(&decay, 2.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_horizon_pruning_is_not_a_drop() {
        let decay = DecayFunction::fixed_window(0.1, 5.0).unwrap();
        let mut buffer = RecentBuffer::new(8);
        buffer.push(0.0, 1.0, &decay);
        buffer.push(10.0, 1.0, &decay);

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.dropped(), 0);
        assert_eq!(buffer.sum(&decay, 10.0), 1.0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let buffer = RecentBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        assert!(buffer.is_empty());
    }
}
