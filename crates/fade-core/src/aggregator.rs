//! Closed set of aggregation regimes behind one value type

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::backward::BackwardDecayAggregator;
use crate::config::EngineConfig;
use crate::decay::DecayFunction;
use crate::error::{DecayError, Result};
use crate::event::Event;
use crate::forward::ForwardDecayAggregator;
use crate::topk::TrackerMode;
use crate::window::SlidingWindowAggregator;

/// How item ages are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// Relative to a fixed landmark
    #[default]
    Forward,
    /// Relative to the latest event
    Backward,
    /// Hard horizon with bucketed history
    Sliding,
}

impl Regime {
    /// Per-key accumulator style that matches this regime
    pub fn tracker_mode(self) -> TrackerMode {
        match self {
            Self::Forward => TrackerMode::Forward,
            Self::Backward | Self::Sliding => TrackerMode::Backward,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Sliding => "sliding",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Regime {
    type Err = DecayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" => Ok(Self::Forward),
            "backward" => Ok(Self::Backward),
            "sliding" | "window" => Ok(Self::Sliding),
            other => Err(DecayError::InvalidConfig(format!(
                "unknown decay regime '{other}' (expected forward, backward or sliding)"
            ))),
        }
    }
}

/// A decayed aggregator of any regime
#[derive(Debug, Clone)]
pub enum Aggregator {
    Forward(ForwardDecayAggregator),
    Backward(BackwardDecayAggregator),
    Sliding(SlidingWindowAggregator),
}

impl Aggregator {
    /// Build the aggregator an engine configuration describes.
    ///
    /// # Errors
    /// `InvalidConfig` if the configuration does not validate.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let decay = config.decay_function()?;
        let aggregator = match config.effective_regime() {
            Regime::Forward => {
                Self::Forward(ForwardDecayAggregator::new(decay, config.buffer_capacity))
            }
            Regime::Backward => {
                Self::Backward(BackwardDecayAggregator::new(decay, config.buffer_capacity))
            }
            Regime::Sliding => {
                Self::Sliding(SlidingWindowAggregator::new(decay, config.window_config()?))
            }
        };
        tracing::debug!(
            regime = %aggregator.regime(),
            decay = %decay,
            fallback = aggregator.fallback_used(),
            "Built aggregator"
        );
        Ok(aggregator)
    }

    pub fn regime(&self) -> Regime {
        match self {
            Self::Forward(_) => Regime::Forward,
            Self::Backward(_) => Regime::Backward,
            Self::Sliding(_) => Regime::Sliding,
        }
    }

    pub fn decay(&self) -> &DecayFunction {
        match self {
            Self::Forward(a) => a.decay(),
            Self::Backward(a) => a.decay(),
            Self::Sliding(a) => a.decay(),
        }
    }

    pub fn update(&mut self, event: &Event) {
        match self {
            Self::Forward(a) => a.update(event),
            Self::Backward(a) => a.update(event),
            Self::Sliding(a) => a.update(event),
        }
    }

    /// Decayed sum `Σ v · weight(now − t_i)`
    pub fn query(&self, now: f64) -> f64 {
        match self {
            Self::Forward(a) => a.query(now),
            Self::Backward(a) => a.query(now),
            Self::Sliding(a) => a.query(now),
        }
    }

    pub fn count(&self, now: f64) -> f64 {
        match self {
            Self::Forward(a) => a.count(now),
            Self::Backward(a) => a.count(now),
            Self::Sliding(a) => a.count(now),
        }
    }

    pub fn average(&self, now: f64) -> f64 {
        match self {
            Self::Forward(a) => a.average(now),
            Self::Backward(a) => a.average(now),
            Self::Sliding(a) => a.average(now),
        }
    }

    pub fn memory_units(&self) -> usize {
        match self {
            Self::Forward(a) => a.memory_units(),
            Self::Backward(a) => a.memory_units(),
            Self::Sliding(a) => a.memory_units(),
        }
    }

    pub fn fallback_used(&self) -> bool {
        match self {
            Self::Forward(a) => a.fallback_used(),
            Self::Backward(a) => a.fallback_used(),
            Self::Sliding(a) => a.fallback_used(),
        }
    }

    pub fn out_of_order_events(&self) -> u64 {
        match self {
            Self::Forward(a) => a.out_of_order_events(),
            Self::Backward(a) => a.out_of_order_events(),
            Self::Sliding(a) => a.out_of_order_events(),
        }
    }

    pub fn last_update_time(&self) -> Option<f64> {
        match self {
            Self::Forward(a) => a.last_update_time(),
            Self::Backward(a) => a.last_update_time(),
            Self::Sliding(a) => a.last_update_time(),
        }
    }

    pub fn items(&self) -> u64 {
        match self {
            Self::Forward(a) => a.items(),
            Self::Backward(a) => a.items(),
            Self::Sliding(a) => a.items(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Forward(a) => a.reset(),
            Self::Backward(a) => a.reset(),
            Self::Sliding(a) => a.reset(),
        }
    }
}

impl From<ForwardDecayAggregator> for Aggregator {
    fn from(aggregator: ForwardDecayAggregator) -> Self {
        Self::Forward(aggregator)
    }
}

impl From<BackwardDecayAggregator> for Aggregator {
    fn from(aggregator: BackwardDecayAggregator) -> Self {
        Self::Backward(aggregator)
    }
}

impl From<SlidingWindowAggregator> for Aggregator {
    fn from(aggregator: SlidingWindowAggregator) -> Self {
        Self::Sliding(aggregator)
    }
}
