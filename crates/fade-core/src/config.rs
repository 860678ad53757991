//! Engine configuration
//!
//! Loaded from environment variables with defaults for anything unset. A
//! variable that is set but cannot be parsed is an error rather than a
//! silent fallback to the default.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

use crate::aggregator::Regime;
use crate::decay::DecayFunction;
use crate::error::{ensure_positive, DecayError, Result};
use crate::oracle::DEFAULT_CAPACITY;
use crate::window::{WindowConfig, MIN_BUCKET_CAP};

/// Decay family selected by `DECAY_TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayKind {
    #[default]
    Exponential,
    Polynomial,
    /// Exponential decay inside a sliding window
    Sliding,
}

impl FromStr for DecayKind {
    type Err = DecayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exponential" | "exp" => Ok(Self::Exponential),
            "polynomial" | "poly" => Ok(Self::Polynomial),
            "sliding" | "window" | "sliding_window" => Ok(Self::Sliding),
            other => Err(DecayError::InvalidConfig(format!(
                "unknown decay type '{other}' (expected exponential, polynomial or sliding)"
            ))),
        }
    }
}

impl fmt::Display for DecayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exponential => "exponential",
            Self::Polynomial => "polynomial",
            Self::Sliding => "sliding",
        })
    }
}

/// When the harness scores the aggregator against the oracle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    /// Every `n` events
    Events(u64),
    /// Every `n` seconds of stream time
    Interval(f64),
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::Events(5000)
    }
}

impl FromStr for Checkpoint {
    type Err = DecayError;

    /// `"5000"` is an event count, `"2.5s"` a stream-time interval.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(seconds) = s.strip_suffix('s') {
            let seconds: f64 = seconds.trim().parse().map_err(|_| {
                DecayError::InvalidConfig(format!("invalid checkpoint interval '{s}'"))
            })?;
            ensure_positive("checkpoint interval", seconds)?;
            return Ok(Self::Interval(seconds));
        }

        match s.parse::<u64>() {
            Ok(events) if events > 0 => Ok(Self::Events(events)),
            _ => Err(DecayError::InvalidConfig(format!(
                "checkpoint must be a positive event count or seconds like '2.5s', given '{s}'"
            ))),
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Events(n) => write!(f, "{n}"),
            Self::Interval(seconds) => write!(f, "{seconds}s"),
        }
    }
}

/// Settings for one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Decay family (env: DECAY_TYPE)
    pub decay_kind: DecayKind,
    /// Forward or backward ages (env: DECAY_REGIME); ignored for sliding
    pub regime: Regime,
    /// Exponential rate α (env: DECAY_RATE)
    pub decay_rate: f64,
    /// Polynomial degree β (env: POLY_DEGREE)
    pub poly_degree: f64,
    /// Sliding-window horizon in seconds (env: WINDOW_SIZE)
    pub window_size: f64,
    /// Ranking size (env: TOPK)
    pub top_k: usize,
    /// Scoring cadence (env: CHECKPOINT_INTERVAL)
    pub checkpoint: Checkpoint,
    /// Bucket span in seconds, `window_size / 30` when unset (env: BUCKET_WIDTH)
    pub bucket_width: Option<f64>,
    /// Maximum live buckets (env: BUCKET_CAP)
    pub bucket_cap: usize,
    /// Fallback buffer size for non-multiplicative decay (env: BUFFER_CAPACITY)
    pub buffer_capacity: usize,
    /// Tracked keys, `8 · top_k` when unset (env: TOPK_CAPACITY)
    pub topk_capacity: Option<usize>,
    /// Events the oracle may retain (env: ORACLE_CAPACITY)
    pub oracle_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decay_kind: DecayKind::Exponential,
            regime: Regime::Forward,
            decay_rate: 0.01,
            poly_degree: 2.0,
            window_size: 30.0,
            top_k: 5,
            checkpoint: Checkpoint::default(),
            bucket_width: None,
            bucket_cap: 32,
            buffer_capacity: 4096,
            topk_capacity: None,
            oracle_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            decay_kind: parse_var(&lookup, "DECAY_TYPE")?.unwrap_or(defaults.decay_kind),
            regime: parse_var(&lookup, "DECAY_REGIME")?.unwrap_or(defaults.regime),
            decay_rate: parse_var(&lookup, "DECAY_RATE")?.unwrap_or(defaults.decay_rate),
            poly_degree: parse_var(&lookup, "POLY_DEGREE")?.unwrap_or(defaults.poly_degree),
            window_size: parse_var(&lookup, "WINDOW_SIZE")?.unwrap_or(defaults.window_size),
            top_k: parse_var(&lookup, "TOPK")?.unwrap_or(defaults.top_k),
            checkpoint: parse_var(&lookup, "CHECKPOINT_INTERVAL")?.unwrap_or(defaults.checkpoint),
            bucket_width: parse_var(&lookup, "BUCKET_WIDTH")?,
            bucket_cap: parse_var(&lookup, "BUCKET_CAP")?.unwrap_or(defaults.bucket_cap),
            buffer_capacity: parse_var(&lookup, "BUFFER_CAPACITY")?
                .unwrap_or(defaults.buffer_capacity),
            topk_capacity: parse_var(&lookup, "TOPK_CAPACITY")?,
            oracle_capacity: parse_var(&lookup, "ORACLE_CAPACITY")?
                .unwrap_or(defaults.oracle_capacity),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every setting without building anything.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("decay rate", self.decay_rate)?;
        ensure_positive("polynomial degree", self.poly_degree)?;
        ensure_positive("window size", self.window_size)?;
        if let Some(width) = self.bucket_width {
            ensure_positive("bucket width", width)?;
        }
        if self.top_k == 0 {
            return Err(invalid("TOPK must be at least 1"));
        }
        if self.bucket_cap < MIN_BUCKET_CAP {
            return Err(invalid(&format!("BUCKET_CAP must be at least {MIN_BUCKET_CAP}")));
        }
        if self.buffer_capacity == 0 {
            return Err(invalid("BUFFER_CAPACITY must be at least 1"));
        }
        if self.oracle_capacity == 0 {
            return Err(invalid("ORACLE_CAPACITY must be at least 1"));
        }
        if self.tracker_capacity() < self.top_k {
            return Err(DecayError::InvalidConfig(format!(
                "TOPK_CAPACITY ({}) must be at least TOPK ({})",
                self.tracker_capacity(),
                self.top_k
            )));
        }
        match self.checkpoint {
            Checkpoint::Events(0) => Err(invalid("checkpoint event count must be at least 1")),
            Checkpoint::Interval(seconds) => ensure_positive("checkpoint interval", seconds),
            Checkpoint::Events(_) => Ok(()),
        }
    }

    /// Sliding decay always runs in the sliding regime.
    pub fn effective_regime(&self) -> Regime {
        match self.decay_kind {
            DecayKind::Sliding => Regime::Sliding,
            _ => self.regime,
        }
    }

    /// The decay function shared by aggregator, tracker and oracle
    pub fn decay_function(&self) -> Result<DecayFunction> {
        if self.effective_regime() == Regime::Sliding {
            return DecayFunction::fixed_window(self.decay_rate, self.window_size);
        }
        match self.decay_kind {
            DecayKind::Polynomial => DecayFunction::polynomial(self.poly_degree),
            DecayKind::Exponential | DecayKind::Sliding => {
                DecayFunction::exponential(self.decay_rate)
            }
        }
    }

    pub fn window_config(&self) -> Result<WindowConfig> {
        WindowConfig::new(
            self.window_size,
            self.bucket_width.unwrap_or(self.window_size / 30.0),
            self.bucket_cap,
        )
    }

    pub fn tracker_capacity(&self) -> usize {
        self.topk_capacity.unwrap_or(self.top_k.saturating_mul(8))
    }
}

fn invalid(message: &str) -> DecayError {
    DecayError::InvalidConfig(message.to_string())
}

/// Parse a variable if set; unset or blank yields `None`.
fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| DecayError::InvalidConfig(format!("{name}='{raw}': {e}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.checkpoint, Checkpoint::Events(5000));
        assert_eq!(config.tracker_capacity(), 40);
        assert_eq!(config.window_config().unwrap().bucket_width, 1.0);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("DECAY_TYPE", "polynomial"),
            ("DECAY_REGIME", "backward"),
            ("POLY_DEGREE", "1.5"),
            ("TOPK", "3"),
            ("CHECKPOINT_INTERVAL", "2.5s"),
        ]))
        .unwrap();

        assert_eq!(config.decay_kind, DecayKind::Polynomial);
        assert_eq!(config.effective_regime(), Regime::Backward);
        assert_eq!(config.checkpoint, Checkpoint::Interval(2.5));
        assert_eq!(
            config.decay_function().unwrap(),
            DecayFunction::Polynomial { degree: 1.5 }
        );
    }

    #[test]
    fn test_sliding_forces_window() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("DECAY_TYPE", "sliding"),
            ("DECAY_REGIME", "forward"),
            ("WINDOW_SIZE", "60"),
        ]))
        .unwrap();
        assert_eq!(config.effective_regime(), Regime::Sliding);
        assert_eq!(config.decay_function().unwrap().horizon(), Some(60.0));
    }

    #[test]
    fn test_unparsable_is_error() {
        for (name, value) in [
            ("DECAY_RATE", "fast"),
            ("DECAY_RATE", "0"),
            ("TOPK", "0"),
            ("TOPK", "-1"),
            ("DECAY_TYPE", "linear"),
            ("CHECKPOINT_INTERVAL", "0"),
            ("CHECKPOINT_INTERVAL", "-2s"),
            ("TOPK_CAPACITY", "2"),
            ("BUCKET_CAP", "1"),
        ] {
            let result = EngineConfig::from_lookup(lookup(&[(name, value)]));
            assert!(
                matches!(result, Err(DecayError::InvalidConfig(_))),
                "{name}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_checkpoint_display_roundtrip() {
        for raw in ["5000", "2.5s"] {
            let checkpoint: Checkpoint = raw.parse().unwrap();
            assert_eq!(checkpoint.to_string(), raw);
        }
    }
}
