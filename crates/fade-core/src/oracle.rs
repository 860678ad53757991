//! Exact reference aggregates
//!
//! The oracle keeps every event it is given and recomputes decayed values
//! from scratch on each query. It exists to score the bounded aggregators
//! and is O(n) per query by construction. History lives in a
//! capacity-checked arena: the caller sizes the experiment to fit, and a
//! run that outgrows it gets `HorizonExceeded` instead of unbounded growth.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::decay::DecayFunction;
use crate::error::{DecayError, Result};
use crate::event::Event;

/// Events retained by `GroundTruthOracle::new`
pub const DEFAULT_CAPACITY: usize = 2_000_000;

#[derive(Debug, Clone)]
pub struct GroundTruthOracle {
    decay: DecayFunction,
    history: Vec<Event>,
    capacity: usize,
}

impl GroundTruthOracle {
    pub fn new(decay: DecayFunction) -> Self {
        Self::with_capacity(decay, DEFAULT_CAPACITY)
    }

    /// Oracle retaining at most `capacity` events
    pub fn with_capacity(decay: DecayFunction, capacity: usize) -> Self {
        Self {
            decay,
            history: Vec::with_capacity(capacity.min(65_536)),
            capacity,
        }
    }

    pub fn decay(&self) -> &DecayFunction {
        &self.decay
    }

    /// Retain an event.
    ///
    /// # Errors
    /// `HorizonExceeded` once `capacity` events are held; the event is not
    /// retained.
    pub fn record(&mut self, event: &Event) -> Result<()> {
        if self.history.len() >= self.capacity {
            return Err(DecayError::HorizonExceeded {
                capacity: self.capacity,
            });
        }
        self.history.push(event.clone());
        Ok(())
    }

    /// Exact `Σ v · weight(now − t_i)`
    pub fn query(&self, now: f64) -> f64 {
        self.history
            .iter()
            .map(|event| event.value * self.decay.weight(now - event.timestamp))
            .sum()
    }

    /// Exact `Σ weight(now − t_i)`
    pub fn count(&self, now: f64) -> f64 {
        self.history
            .iter()
            .map(|event| self.decay.weight(now - event.timestamp))
            .sum()
    }

    /// Exact forward-decay sum `Σ v · g(t_i − L) / g(now − L)`
    pub fn landmark_query(&self, landmark: f64, now: f64) -> f64 {
        let now_elapsed = now - landmark;
        self.history
            .iter()
            .map(|event| {
                let item_elapsed = (event.timestamp - landmark).max(0.0);
                event.value * self.decay.landmark_weight(item_elapsed, now_elapsed)
            })
            .sum()
    }

    /// Exact per-key ranking at `now`, heaviest first, ties by key
    pub fn top_k(&self, k: usize, now: f64) -> Vec<(String, f64)> {
        let mut totals: HashMap<&str, f64> = HashMap::new();
        for event in &self.history {
            *totals.entry(event.key.as_str()).or_insert(0.0) +=
                event.value * self.decay.weight(now - event.timestamp);
        }

        let mut ranked: Vec<(String, f64)> = totals
            .into_iter()
            .map(|(key, weight)| (key.to_string(), weight))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        ranked
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.history.len())
    }

    /// One unit per retained event
    pub fn memory_units(&self) -> usize {
        self.history.len()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
