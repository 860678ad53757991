//! Capacity-bounded decayed heavy hitters
//!
//! Each tracked key carries its own accumulator, in the same regime as the
//! parent aggregator. The table is unordered; ranking happens only when
//! `query` is called.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::decay::DecayFunction;
use crate::error::{DecayError, Result};
use crate::event::{Event, StreamClock};
use crate::forward::REBASE_THRESHOLD;

/// Per-key accumulator style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerMode {
    /// Store `Σ v · g(t − L)`; the stored order is the order at any time
    Forward,
    /// Store the weight at `last_seen` and rescale on every touch.
    ///
    /// Exact only for exponential decay. With a fixed window, a key touched
    /// at least once per horizon never sees a zero factor, so contributions
    /// older than the horizon linger (reported through `fallback_used`).
    Backward,
}

/// One tracked key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKEntry {
    pub key: String,
    /// Landmark-relative weight in forward mode, weight at `last_seen` in
    /// backward mode
    pub decayed_weight: f64,
    pub last_seen: f64,
}

/// Approximate top-K over decayed per-key sums
#[derive(Debug, Clone)]
pub struct TopKTracker {
    k: usize,
    capacity: usize,
    decay: DecayFunction,
    mode: TrackerMode,
    landmark: Option<f64>,
    entries: HashMap<String, TopKEntry>,
    clock: StreamClock,
    evictions: u64,
}

impl TopKTracker {
    /// Track up to `capacity` keys and rank the best `k`.
    pub fn new(k: usize, capacity: usize, decay: DecayFunction, mode: TrackerMode) -> Result<Self> {
        if k == 0 {
            return Err(DecayError::InvalidConfig(
                "top-k size must be at least 1".to_string(),
            ));
        }
        if capacity < k {
            return Err(DecayError::InvalidConfig(format!(
                "top-k capacity ({capacity}) must be at least k ({k})"
            )));
        }
        Ok(Self {
            k,
            capacity,
            decay,
            mode,
            landmark: None,
            entries: HashMap::with_capacity(capacity.min(4096)),
            clock: StreamClock::new(),
            evictions: 0,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mode(&self) -> TrackerMode {
        self.mode
    }

    pub fn update(&mut self, event: &Event) {
        let now = self.clock.advance(event.timestamp);

        let contribution = match self.mode {
            TrackerMode::Forward => self.forward_contribution(event.timestamp, event.value),
            TrackerMode::Backward => event.value,
        };

        if let Some(entry) = self.entries.get_mut(&event.key) {
            match self.mode {
                TrackerMode::Forward => entry.decayed_weight += contribution,
                TrackerMode::Backward => {
                    let factor = self.decay.weight(now - entry.last_seen);
                    entry.decayed_weight = entry.decayed_weight * factor + contribution;
                }
            }
            entry.last_seen = entry.last_seen.max(now);
            return;
        }

        if self.entries.len() >= self.capacity {
            self.evict_min(now);
        }

        self.entries.insert(
            event.key.clone(),
            TopKEntry {
                key: event.key.clone(),
                decayed_weight: contribution,
                last_seen: now,
            },
        );
    }

    /// `v · g(t − L)`, rebasing every entry first when the growth would
    /// overflow.
    fn forward_contribution(&mut self, timestamp: f64, value: f64) -> f64 {
        let landmark = *self.landmark.get_or_insert(timestamp);
        let timestamp = timestamp.max(landmark);

        let growth = self.decay.growth(timestamp - landmark);
        if growth <= REBASE_THRESHOLD {
            return value * growth;
        }
        match self.decay.rebase_factor(timestamp - landmark) {
            Some(factor) => {
                for entry in self.entries.values_mut() {
                    entry.decayed_weight *= factor;
                }
                self.landmark = Some(timestamp);
                tracing::debug!(
                    old_landmark = landmark,
                    new_landmark = timestamp,
                    "Rebased top-k landmark"
                );
                value
            }
            None => value * growth,
        }
    }

    /// Weight of an entry evaluated at `now`
    fn weight_at(&self, entry: &TopKEntry, now: f64) -> f64 {
        match self.mode {
            TrackerMode::Forward => match self.landmark {
                Some(landmark) => entry.decayed_weight / self.decay.growth(now - landmark),
                None => 0.0,
            },
            TrackerMode::Backward => entry.decayed_weight * self.decay.weight(now - entry.last_seen),
        }
    }

    /// Remove the lightest entry at `now`, oldest `last_seen` on ties.
    fn evict_min(&mut self, now: f64) {
        let victim = self
            .entries
            .values()
            .min_by(|a, b| {
                self.weight_at(a, now)
                    .partial_cmp(&self.weight_at(b, now))
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| {
                        a.last_seen
                            .partial_cmp(&b.last_seen)
                            .unwrap_or(Ordering::Equal)
                    })
            })
            .map(|entry| entry.key.clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            self.evictions += 1;
            metrics::counter!("fade_topk_evictions_total").increment(1);
        }
    }

    /// Up to `k` keys ordered by decayed weight at `now`, heaviest first.
    pub fn query(&self, now: f64) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .entries
            .values()
            .map(|entry| (entry.key.clone(), self.weight_at(entry, now)))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(self.k);
        ranked
    }

    /// Keys of `query(now)`, in rank order
    pub fn top_keys(&self, now: f64) -> Vec<String> {
        self.query(now).into_iter().map(|(key, _)| key).collect()
    }

    pub fn get(&self, key: &str) -> Option<&TopKEntry> {
        self.entries.get(key)
    }

    /// Per-key weights are only exact for multiplicative decay
    pub fn fallback_used(&self) -> bool {
        !self.decay.is_multiplicative()
    }

    pub fn memory_units(&self) -> usize {
        self.entries.len()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.landmark = None;
        self.clock.reset();
        self.evictions = 0;
    }
}
