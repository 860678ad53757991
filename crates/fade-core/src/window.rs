//! Sliding-window aggregation
//!
//! Items are grouped into time buckets. Buckets whose newest item is older
//! than the horizon are evicted, and when more than `bucket_cap` buckets are
//! live the lightest adjacent pair is merged, exponential-histogram style:
//! on equal weight the older pair goes first. Memory is therefore bounded by
//! the cap, at the cost of coarser boundaries for old data.
//!
//! The oldest bucket only absorbs its neighbour while the two are the
//! lightest pair, so it never grows past the items still inside the
//! horizon and ages out on schedule.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::decay::DecayFunction;
use crate::error::{ensure_positive, DecayError, Result};
use crate::event::{Event, StreamClock};

/// Grouped summary of the items that arrived within one bucket span
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Timestamp of the first item (lower bound of the span)
    pub start: f64,
    /// Timestamp of the newest item; the bucket's representative time
    pub bucket_timestamp: f64,
    pub raw_count: f64,
    pub raw_sum: f64,
}

impl Bucket {
    fn open(timestamp: f64, value: f64) -> Self {
        Self {
            start: timestamp,
            bucket_timestamp: timestamp,
            raw_count: 1.0,
            raw_sum: value,
        }
    }

    fn merge(older: Bucket, newer: Bucket) -> Self {
        Self {
            start: older.start,
            bucket_timestamp: newer.bucket_timestamp,
            raw_count: older.raw_count + newer.raw_count,
            raw_sum: older.raw_sum + newer.raw_sum,
        }
    }
}

/// A single bucket would absorb every item and never expire
pub const MIN_BUCKET_CAP: usize = 2;

/// Bucket layout of a sliding window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window length in seconds
    pub horizon: f64,
    /// Maximum span of a single bucket in seconds
    pub bucket_width: f64,
    /// Maximum number of live buckets, at least [`MIN_BUCKET_CAP`]
    pub bucket_cap: usize,
}

impl WindowConfig {
    pub fn new(horizon: f64, bucket_width: f64, bucket_cap: usize) -> Result<Self> {
        ensure_positive("window horizon", horizon)?;
        ensure_positive("bucket width", bucket_width)?;
        if bucket_cap < MIN_BUCKET_CAP {
            return Err(DecayError::InvalidConfig(format!(
                "bucket cap must be at least {MIN_BUCKET_CAP}"
            )));
        }
        Ok(Self {
            horizon,
            bucket_width,
            bucket_cap,
        })
    }

    /// 30 buckets across the horizon, capped at 32
    pub fn for_horizon(horizon: f64) -> Result<Self> {
        Self::new(horizon, horizon / 30.0, 32)
    }
}

/// Bucketed decayed aggregate over `[now − horizon, now]`
#[derive(Debug, Clone)]
pub struct SlidingWindowAggregator {
    decay: DecayFunction,
    config: WindowConfig,
    buckets: VecDeque<Bucket>,
    clock: StreamClock,
    items: u64,
    evictions: u64,
    merges: u64,
}

impl SlidingWindowAggregator {
    pub fn new(decay: DecayFunction, config: WindowConfig) -> Self {
        Self {
            decay,
            config,
            buckets: VecDeque::with_capacity(config.bucket_cap.min(1024) + 1),
            clock: StreamClock::new(),
            items: 0,
            evictions: 0,
            merges: 0,
        }
    }

    pub fn decay(&self) -> &DecayFunction {
        &self.decay
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Add an event to the newest bucket (or a fresh one), then evict and
    /// merge to restore the horizon and the cap.
    pub fn update(&mut self, event: &Event) {
        let now = self.clock.advance(event.timestamp);
        self.items += 1;

        match self.buckets.back_mut() {
            Some(bucket) if now - bucket.start < self.config.bucket_width => {
                bucket.raw_count += 1.0;
                bucket.raw_sum += event.value;
                bucket.bucket_timestamp = bucket.bucket_timestamp.max(now);
            }
            _ => self.buckets.push_back(Bucket::open(now, event.value)),
        }

        self.expire(now);

        while self.buckets.len() > self.config.bucket_cap {
            self.merge_lightest();
        }
    }

    /// Drop buckets whose newest item fell out of the window at `now`.
    pub fn expire(&mut self, now: f64) {
        let cutoff = now - self.config.horizon;
        while self
            .buckets
            .front()
            .is_some_and(|bucket| bucket.bucket_timestamp < cutoff)
        {
            self.buckets.pop_front();
            self.evictions += 1;
        }
    }

    fn merge_lightest(&mut self) {
        let pair_count = |i: usize| self.buckets[i].raw_count + self.buckets[i + 1].raw_count;
        let lightest = (0..self.buckets.len().saturating_sub(1))
            .min_by(|&a, &b| pair_count(a).partial_cmp(&pair_count(b)).unwrap_or(Ordering::Equal));

        if let Some(index) = lightest {
            if let Some(newer) = self.buckets.remove(index + 1) {
                let older = self.buckets[index];
                self.buckets[index] = Bucket::merge(older, newer);
                self.merges += 1;
            }
        }
    }

    /// `Σ raw_sum · weight(now − bucket_timestamp)` over buckets still
    /// inside the window at `now`
    pub fn query(&self, now: f64) -> f64 {
        self.live(now)
            .map(|bucket| bucket.raw_sum * self.decay.weight(now - bucket.bucket_timestamp))
            .sum()
    }

    /// `Σ raw_count · weight(now − bucket_timestamp)` over live buckets
    pub fn count(&self, now: f64) -> f64 {
        self.live(now)
            .map(|bucket| bucket.raw_count * self.decay.weight(now - bucket.bucket_timestamp))
            .sum()
    }

    pub fn average(&self, now: f64) -> f64 {
        let count = self.count(now);
        if count > 0.0 {
            self.query(now) / count
        } else {
            0.0
        }
    }

    fn live(&self, now: f64) -> impl Iterator<Item = &Bucket> {
        let cutoff = now - self.config.horizon;
        self.buckets
            .iter()
            .filter(move |bucket| bucket.bucket_timestamp >= cutoff)
    }

    /// Live buckets, oldest first
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    /// Number of retained buckets, never above the configured cap
    pub fn memory_units(&self) -> usize {
        self.buckets.len()
    }

    /// Bucket timestamps approximate item ages unless every bucket holds
    /// items with a single timestamp; the window never switches paths.
    pub fn fallback_used(&self) -> bool {
        false
    }

    pub fn items(&self) -> u64 {
        self.items
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn merges(&self) -> u64 {
        self.merges
    }

    pub fn last_update_time(&self) -> Option<f64> {
        self.clock.last()
    }

    pub fn out_of_order_events(&self) -> u64 {
        self.clock.out_of_order()
    }

    pub fn reset(&mut self) {
        self.buckets.clear();
        self.clock.reset();
        self.items = 0;
        self.evictions = 0;
        self.merges = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(horizon: f64, width: f64, cap: usize) -> SlidingWindowAggregator {
        let decay = DecayFunction::fixed_window(0.01, horizon).unwrap();
        SlidingWindowAggregator::new(decay, WindowConfig::new(horizon, width, cap).unwrap())
    }

    #[test]
    fn test_invalid_config() {
        assert!(WindowConfig::new(0.0, 1.0, 4).is_err());
        assert!(WindowConfig::new(10.0, -1.0, 4).is_err());
        assert!(WindowConfig::new(10.0, 1.0, 0).is_err());
        assert!(WindowConfig::new(10.0, 1.0, 1).is_err());
        assert!(WindowConfig::new(10.0, 1.0, MIN_BUCKET_CAP).is_ok());
        assert!(WindowConfig::for_horizon(30.0).is_ok());
    }

    #[test]
    fn test_items_share_bucket_within_width() {
        let mut sw = window(60.0, 5.0, 16);
        sw.update(&Event::new(0.0, "a", 1.0));
        sw.update(&Event::new(4.0, "a", 2.0));
        sw.update(&Event::new(5.0, "a", 3.0));

        let buckets: Vec<_> = sw.buckets().copied().collect();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].raw_sum, 3.0);
        assert_eq!(buckets[0].bucket_timestamp, 4.0);
        assert_eq!(buckets[1].raw_count, 1.0);
    }

    #[test]
    fn test_old_event_contributes_nothing() {
        let mut sw = window(10.0, 1.0, 64);
        sw.update(&Event::new(0.0, "a", 100.0));
        sw.update(&Event::new(20.0, "a", 1.0));

        assert_eq!(sw.query(20.0), 1.0);
        assert_eq!(sw.memory_units(), 1);
        assert_eq!(sw.evictions(), 1);
    }

    #[test]
    fn test_query_filters_without_update() {
        let mut sw = window(10.0, 1.0, 64);
        sw.update(&Event::new(0.0, "a", 100.0));
        assert_eq!(sw.query(10.5), 0.0);

        sw.expire(10.5);
        assert_eq!(sw.memory_units(), 0);
    }

    #[test]
    fn test_merge_keeps_cap_and_totals() {
        let mut sw = window(1_000.0, 1.0, 4);
        for t in 0..10 {
            sw.update(&Event::hit(t as f64, "a"));
        }

        assert_eq!(sw.memory_units(), 4);
        let total: f64 = sw.buckets().map(|b| b.raw_count).sum();
        assert_eq!(total, 10.0);
        let oldest = sw.buckets().next().unwrap();
        assert_eq!(oldest.start, 0.0);
        assert!(sw.merges() > 0);
    }

    #[test]
    fn test_old_burst_ages_out_when_cap_is_small() {
        // 11 one-second buckets fit in the horizon but only 4 may live
        let mut sw = window(10.0, 1.0, 4);
        sw.update(&Event::new(0.0, "a", 1e6));
        for t in 1..=1000 {
            sw.update(&Event::hit(t as f64, "a"));
        }

        // Σ e^(-0.01·age) for ages 0..=10
        let exact: f64 = (0..=10).map(|age| (-0.01 * age as f64).exp()).sum();
        let approx = sw.query(1000.0);
        assert!((approx - exact).abs() / exact < 0.15, "approx {approx}, exact {exact}");

        assert_eq!(sw.memory_units(), 4);
        let oldest = sw.buckets().next().unwrap();
        assert!(oldest.start >= 1000.0 - 2.0 * 10.0);
        assert!(oldest.raw_count <= 11.0);
        assert!(sw.evictions() > 0);
    }

    #[test]
    fn test_merge_prefers_lightest_pair() {
        let mut sw = window(1_000.0, 1.0, 3);
        for _ in 0..5 {
            sw.update(&Event::hit(0.0, "a"));
        }
        sw.update(&Event::hit(1.0, "a"));
        sw.update(&Event::hit(2.0, "a"));
        sw.update(&Event::hit(3.0, "a"));

        let counts: Vec<f64> = sw.buckets().map(|b| b.raw_count).collect();
        assert_eq!(counts, vec![5.0, 2.0, 1.0]);
        let timestamps: Vec<f64> = sw.buckets().map(|b| b.bucket_timestamp).collect();
        assert_eq!(timestamps, vec![0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_empty_window_is_zero() {
        let sw = window(10.0, 1.0, 4);
        assert_eq!(sw.query(100.0), 0.0);
        assert_eq!(sw.average(100.0), 0.0);
    }
}
