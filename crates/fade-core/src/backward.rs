//! Backward decay
//!
//! Weights are measured from the current time, so every stored contribution
//! shifts whenever time advances. For exponential decay the whole aggregate
//! is rescaled in O(1) by `weight(now − last) / weight(0)` before the new
//! item is added with weight 1. Polynomial and fixed-window decay have no
//! such rescale; they recompute over a bounded buffer of recent items and
//! report the fallback.

use crate::buffer::RecentBuffer;
use crate::decay::DecayFunction;
use crate::event::{Event, StreamClock};

/// Decayed sum/count relative to the latest processed timestamp
#[derive(Debug, Clone)]
pub struct BackwardDecayAggregator {
    decay: DecayFunction,
    decayed_sum: f64,
    decayed_count: f64,
    items: u64,
    clock: StreamClock,
    fallback: Option<RecentBuffer>,
}

impl BackwardDecayAggregator {
    pub fn new(decay: DecayFunction, buffer_capacity: usize) -> Self {
        let fallback = (!decay.is_multiplicative()).then(|| RecentBuffer::new(buffer_capacity));
        Self {
            decay,
            decayed_sum: 0.0,
            decayed_count: 0.0,
            items: 0,
            clock: StreamClock::new(),
            fallback,
        }
    }

    pub fn decay(&self) -> &DecayFunction {
        &self.decay
    }

    /// Rescale to the event time, then add the event with weight 1.
    pub fn update(&mut self, event: &Event) {
        let previous = self.clock.last();
        let now = self.clock.advance(event.timestamp);
        self.items += 1;

        if let Some(buffer) = &mut self.fallback {
            buffer.push(now, event.value, &self.decay);
            return;
        }

        if let Some(last) = previous {
            let factor = self.decay.weight(now - last) / self.decay.weight(0.0);
            self.decayed_sum *= factor;
            self.decayed_count *= factor;
        }

        self.decayed_sum += event.value;
        self.decayed_count += 1.0;
    }

    /// Decayed sum at `now`; equals the stored sum when `now` is the latest
    /// processed timestamp.
    pub fn query(&self, now: f64) -> f64 {
        match &self.fallback {
            Some(buffer) => buffer.sum(&self.decay, now),
            None => self.decayed_sum * self.elapsed_factor(now),
        }
    }

    /// Decayed count at `now`
    pub fn count(&self, now: f64) -> f64 {
        match &self.fallback {
            Some(buffer) => buffer.count(&self.decay, now),
            None => self.decayed_count * self.elapsed_factor(now),
        }
    }

    pub fn average(&self, now: f64) -> f64 {
        let count = self.count(now);
        if count > 0.0 {
            self.query(now) / count
        } else {
            0.0
        }
    }

    fn elapsed_factor(&self, now: f64) -> f64 {
        match self.clock.last() {
            Some(last) => self.decay.weight(now - last),
            None => 0.0,
        }
    }

    /// Whether the polynomial/window approximation is in use
    pub fn fallback_used(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn fallback_dropped(&self) -> u64 {
        self.fallback.as_ref().map_or(0, RecentBuffer::dropped)
    }

    pub fn memory_units(&self) -> usize {
        1 + self.fallback.as_ref().map_or(0, RecentBuffer::len)
    }

    pub fn items(&self) -> u64 {
        self.items
    }

    pub fn last_update_time(&self) -> Option<f64> {
        self.clock.last()
    }

    pub fn out_of_order_events(&self) -> u64 {
        self.clock.out_of_order()
    }

    pub fn reset(&mut self) {
        self.decayed_sum = 0.0;
        self.decayed_count = 0.0;
        self.items = 0;
        self.clock.reset();
        if let Some(buffer) = &mut self.fallback {
            buffer.clear();
        }
    }
}
