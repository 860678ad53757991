//! Forward decay
//!
//! Weights are computed once, relative to a fixed landmark `L` (the first
//! observed timestamp), and never change afterwards:
//! `raw_sum = Σ v_i · g(t_i − L)`. The decayed sum at time `t` is
//! `raw_sum / g(t − L)`, so updates and queries are O(1).
//!
//! When the target is the age-based aggregate `Σ v_i · weight(t − t_i)`,
//! the landmark form only factorizes for exponential decay. Other functions
//! fall back to recomputation over a bounded buffer of recent items.

use crate::buffer::RecentBuffer;
use crate::decay::DecayFunction;
use crate::event::{Event, StreamClock};

/// Growth values above this trigger a landmark rebase
pub(crate) const REBASE_THRESHOLD: f64 = 1e200;

/// Decayed sum/count relative to a fixed landmark
#[derive(Debug, Clone)]
pub struct ForwardDecayAggregator {
    decay: DecayFunction,
    landmark: Option<f64>,
    raw_sum: f64,
    raw_count: f64,
    items: u64,
    rebases: u64,
    clock: StreamClock,
    fallback: Option<RecentBuffer>,
}

impl ForwardDecayAggregator {
    /// Create an aggregator whose landmark is set by the first event.
    ///
    /// `buffer_capacity` bounds the fallback buffer used when `decay` is not
    /// multiplicative.
    pub fn new(decay: DecayFunction, buffer_capacity: usize) -> Self {
        let fallback = (!decay.is_multiplicative()).then(|| RecentBuffer::new(buffer_capacity));
        Self {
            decay,
            landmark: None,
            raw_sum: 0.0,
            raw_count: 0.0,
            items: 0,
            rebases: 0,
            clock: StreamClock::new(),
            fallback,
        }
    }

    /// Create an aggregator with an explicit landmark
    pub fn with_landmark(decay: DecayFunction, buffer_capacity: usize, landmark: f64) -> Self {
        let mut aggregator = Self::new(decay, buffer_capacity);
        aggregator.landmark = Some(landmark);
        aggregator
    }

    pub fn decay(&self) -> &DecayFunction {
        &self.decay
    }

    /// Current landmark, once the first event has arrived
    pub fn landmark(&self) -> Option<f64> {
        self.landmark
    }

    /// Add an event. Items earlier than the landmark are treated as
    /// arriving at the landmark.
    pub fn update(&mut self, event: &Event) {
        // Forward weights do not depend on arrival order; the clock only
        // keeps the out-of-order count.
        self.clock.advance(event.timestamp);

        let landmark = *self.landmark.get_or_insert(event.timestamp);
        let timestamp = event.timestamp.max(landmark);

        let mut growth = self.decay.growth(timestamp - landmark);
        if growth > REBASE_THRESHOLD && self.rebase(timestamp) {
            growth = 1.0;
        }

        self.raw_sum += event.value * growth;
        self.raw_count += growth;
        self.items += 1;

        if let Some(buffer) = &mut self.fallback {
            buffer.push(timestamp, event.value, &self.decay);
        }
    }

    /// Move the landmark to `new_landmark`, rescaling the stored sums.
    ///
    /// Returns `false` when the decay function has no exact rebase.
    pub fn rebase(&mut self, new_landmark: f64) -> bool {
        let Some(old) = self.landmark else {
            self.landmark = Some(new_landmark);
            return true;
        };
        let Some(factor) = self.decay.rebase_factor(new_landmark - old) else {
            return false;
        };

        self.raw_sum *= factor;
        self.raw_count *= factor;
        self.landmark = Some(new_landmark.max(old));
        self.rebases += 1;

        tracing::debug!(
            old_landmark = old,
            new_landmark,
            factor,
            "Rebased forward decay landmark"
        );
        true
    }

    /// Decayed sum `Σ v_i · weight(now − t_i)`
    pub fn query(&self, now: f64) -> f64 {
        match &self.fallback {
            Some(buffer) => buffer.sum(&self.decay, now),
            None => self.landmark_query(now),
        }
    }

    /// Decayed count `Σ weight(now − t_i)`
    pub fn count(&self, now: f64) -> f64 {
        match &self.fallback {
            Some(buffer) => buffer.count(&self.decay, now),
            None => self.landmark_count(now),
        }
    }

    /// Decayed average, `0` when nothing has been seen
    pub fn average(&self, now: f64) -> f64 {
        let count = self.count(now);
        if count > 0.0 {
            self.query(now) / count
        } else {
            0.0
        }
    }

    /// Pure forward-decay sum `Σ v_i · g(t_i − L) / g(now − L)`, O(1) for
    /// every decay function.
    pub fn landmark_query(&self, now: f64) -> f64 {
        match self.landmark {
            Some(landmark) => self.raw_sum / self.decay.growth(now - landmark),
            None => 0.0,
        }
    }

    /// Pure forward-decay count `Σ g(t_i − L) / g(now − L)`
    pub fn landmark_count(&self, now: f64) -> f64 {
        match self.landmark {
            Some(landmark) => self.raw_count / self.decay.growth(now - landmark),
            None => 0.0,
        }
    }

    /// Whether queries are answered from the bounded recent buffer
    pub fn fallback_used(&self) -> bool {
        self.fallback.is_some()
    }

    /// Items lost from the fallback buffer
    pub fn fallback_dropped(&self) -> u64 {
        self.fallback.as_ref().map_or(0, RecentBuffer::dropped)
    }

    /// Retained structural elements: the accumulator plus any buffered items
    pub fn memory_units(&self) -> usize {
        1 + self.fallback.as_ref().map_or(0, RecentBuffer::len)
    }

    pub fn items(&self) -> u64 {
        self.items
    }

    pub fn rebases(&self) -> u64 {
        self.rebases
    }

    pub fn last_update_time(&self) -> Option<f64> {
        self.clock.last()
    }

    pub fn out_of_order_events(&self) -> u64 {
        self.clock.out_of_order()
    }

    /// Discard the aggregate and the landmark (stream restart)
    pub fn reset(&mut self) {
        self.landmark = None;
        self.raw_sum = 0.0;
        self.raw_count = 0.0;
        self.items = 0;
        self.rebases = 0;
        self.clock.reset();
        if let Some(buffer) = &mut self.fallback {
            buffer.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exponential(rate: f64) -> ForwardDecayAggregator {
        ForwardDecayAggregator::new(DecayFunction::exponential(rate).unwrap(), 16)
    }

    #[test]
    fn test_single_event_at_age() {
        let mut fd = exponential(0.1);
        fd.update(&Event::new(100.0, "a", 7.0));

        let expected = 7.0 * fd.decay().weight(12.5);
        assert!((fd.query(112.5) - expected).abs() < 1e-9);
        assert_eq!(fd.landmark(), Some(100.0));
        assert!(!fd.fallback_used());
    }

    #[test]
    fn test_example_stream() {
        // Items at offsets 5, 7, 3, 8, 4 with a quadratic forward decay,
        // measured 10s after the landmark.
        let decay = DecayFunction::polynomial(2.0).unwrap();
        let mut fd = ForwardDecayAggregator::with_landmark(decay, 16, 0.0);
        for (offset, value) in [(5.0, 4.0), (7.0, 8.0), (3.0, 3.0), (8.0, 6.0), (4.0, 4.0)] {
            fd.update(&Event::new(offset, "x", value));
        }

        let expected: f64 = [(5.0, 4.0), (7.0, 8.0), (3.0, 3.0), (8.0, 6.0), (4.0, 4.0)]
            .iter()
            .map(|(t, v)| v * ((t + 1.0) / 11.0f64).powi(2))
            .sum();
        assert!((fd.landmark_query(10.0) - expected).abs() < 1e-9);
        assert!(fd.fallback_used());
    }

    #[test]
    fn test_average() {
        let mut fd = exponential(0.5);
        assert_eq!(fd.average(0.0), 0.0);
        fd.update(&Event::new(0.0, "a", 4.0));
        fd.update(&Event::new(0.0, "b", 8.0));
        assert!((fd.average(3.0) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_polynomial_query_uses_buffer() {
        let decay = DecayFunction::polynomial(1.0).unwrap();
        let mut fd = ForwardDecayAggregator::new(decay, 16);
        fd.update(&Event::new(0.0, "a", 1.0));
        fd.update(&Event::new(1.0, "a", 1.0));

        // (2+1)^-1 + (1+1)^-1
        assert!((fd.query(2.0) - (1.0 / 3.0 + 0.5)).abs() < 1e-12);
        assert_eq!(fd.memory_units(), 3);
    }

    #[test]
    fn test_rebase_keeps_query_exact() {
        let mut fd = exponential(1.0);
        fd.update(&Event::new(0.0, "a", 1.0));
        // e^(500) exceeds the rebase threshold
        fd.update(&Event::new(500.0, "a", 1.0));

        assert_eq!(fd.rebases(), 1);
        assert_eq!(fd.landmark(), Some(500.0));
        let expected = 1.0 + (-500.0f64).exp();
        assert!((fd.query(500.0) - expected).abs() < 1e-9);
        assert!(fd.query(500.0).is_finite());
    }

    #[test]
    fn test_out_of_order_before_landmark_is_clamped() {
        let mut fd = exponential(0.1);
        fd.update(&Event::new(10.0, "a", 1.0));
        fd.update(&Event::new(5.0, "a", 1.0));

        assert_eq!(fd.out_of_order_events(), 1);
        assert!((fd.query(10.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset() {
        let mut fd = exponential(0.1);
        fd.update(&Event::new(10.0, "a", 1.0));
        fd.reset();

        assert_eq!(fd.landmark(), None);
        assert_eq!(fd.query(20.0), 0.0);
        fd.update(&Event::new(30.0, "a", 2.0));
        assert_eq!(fd.landmark(), Some(30.0));
    }
}
