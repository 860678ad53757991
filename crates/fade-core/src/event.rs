//! Stream events and per-aggregator stream time

use serde::{Deserialize, Serialize};

use crate::error::{DecayError, Result};

/// A single timestamped, keyed, valued item of the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Arrival time in seconds
    pub timestamp: f64,
    /// Grouping key (item id, destination address, ...)
    pub key: String,
    /// Value contributed to the aggregate
    pub value: f64,
}

impl Event {
    /// Create a new event
    pub fn new(timestamp: f64, key: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp,
            key: key.into(),
            value,
        }
    }

    /// Create an event with value 1, for counting occurrences
    pub fn hit(timestamp: f64, key: impl Into<String>) -> Self {
        Self::new(timestamp, key, 1.0)
    }

    /// Check that the event can be aggregated without breaking the
    /// non-negative sum invariant.
    pub fn validate(&self) -> Result<()> {
        if !self.timestamp.is_finite() {
            return Err(DecayError::MalformedEvent(format!(
                "timestamp must be finite, given {}",
                self.timestamp
            )));
        }
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(DecayError::MalformedEvent(format!(
                "value must be finite and non-negative, given {} for key '{}'",
                self.value, self.key
            )));
        }
        Ok(())
    }
}

/// Latest timestamp seen by one aggregator.
///
/// Late arrivals are clamped to the latest time seen so their age is zero,
/// and counted.
#[derive(Debug, Clone, Default)]
pub struct StreamClock {
    last: Option<f64>,
    out_of_order: u64,
}

impl StreamClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock to `timestamp` and return the effective event time.
    pub fn advance(&mut self, timestamp: f64) -> f64 {
        match self.last {
            Some(last) if timestamp < last => {
                self.out_of_order += 1;
                metrics::counter!("fade_out_of_order_events_total").increment(1);
                tracing::debug!(
                    timestamp,
                    last_seen = last,
                    "Out-of-order event, clamping age to zero"
                );
                last
            }
            _ => {
                self.last = Some(timestamp);
                timestamp
            }
        }
    }

    /// Latest timestamp seen, if any
    pub fn last(&self) -> Option<f64> {
        self.last
    }

    /// Number of events that arrived behind the clock
    pub fn out_of_order(&self) -> u64 {
        self.out_of_order
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
