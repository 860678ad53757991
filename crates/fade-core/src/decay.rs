//! Decay functions
//!
//! A decay function maps the age of an item to a weight. Every variant
//! satisfies `weight(0) = 1`, `0 ≤ weight(age) ≤ 1`, and is non-increasing
//! in `age`.
//!
//! For forward decay each variant also provides a positive, non-decreasing
//! growth function `g`, so that the weight of an item that arrived at `t_i`,
//! measured at `t`, is `g(t_i − L) / g(t − L)` for a landmark `L`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ensure_positive, Result};

/// Weighting policy evaluated at a given item age
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecayFunction {
    /// `w(a) = e^(-rate·a)`
    Exponential { rate: f64 },
    /// `w(a) = (a + 1)^(-degree)`
    Polynomial { degree: f64 },
    /// `w(a) = e^(-rate·a)` for `a ≤ horizon`, `0` afterwards
    FixedWindow { rate: f64, horizon: f64 },
}

impl DecayFunction {
    /// Exponential decay with rate α.
    ///
    /// # Example
    /// ```
    /// use fade_core::DecayFunction;
    ///
    /// let decay = DecayFunction::exponential(0.5).unwrap();
    /// assert_eq!(decay.weight(0.0), 1.0);
    /// assert!((decay.weight(2.0) - (-1.0f64).exp()).abs() < 1e-12);
    /// assert!(DecayFunction::exponential(0.0).is_err());
    /// ```
    pub fn exponential(rate: f64) -> Result<Self> {
        ensure_positive("decay rate", rate)?;
        Ok(Self::Exponential { rate })
    }

    /// Polynomial decay with degree β.
    pub fn polynomial(degree: f64) -> Result<Self> {
        ensure_positive("polynomial degree", degree)?;
        Ok(Self::Polynomial { degree })
    }

    /// Exponential decay inside a hard window of `horizon` seconds.
    pub fn fixed_window(rate: f64, horizon: f64) -> Result<Self> {
        ensure_positive("decay rate", rate)?;
        ensure_positive("window horizon", horizon)?;
        Ok(Self::FixedWindow { rate, horizon })
    }

    /// Weight of an item of the given age. Negative ages count as zero.
    pub fn weight(&self, age: f64) -> f64 {
        let age = age.max(0.0);
        match *self {
            Self::Exponential { rate } => (-rate * age).exp(),
            Self::Polynomial { degree } => (age + 1.0).powf(-degree),
            Self::FixedWindow { rate, horizon } => {
                if age <= horizon {
                    (-rate * age).exp()
                } else {
                    0.0
                }
            }
        }
    }

    /// Forward-decay growth function `g(n)` for `n` seconds past the landmark.
    pub fn growth(&self, elapsed: f64) -> f64 {
        let elapsed = elapsed.max(0.0);
        match *self {
            Self::Exponential { rate } | Self::FixedWindow { rate, .. } => (rate * elapsed).exp(),
            Self::Polynomial { degree } => (elapsed + 1.0).powf(degree),
        }
    }

    /// Forward-decay weight `g(item_elapsed) / g(now_elapsed)`.
    ///
    /// Both arguments are measured from the landmark; an item newer than
    /// `now` is treated as arriving at `now`.
    pub fn landmark_weight(&self, item_elapsed: f64, now_elapsed: f64) -> f64 {
        let item_elapsed = item_elapsed.min(now_elapsed);
        self.growth(item_elapsed) / self.growth(now_elapsed)
    }

    /// Factor that moves landmark-relative sums `shift` seconds forward.
    ///
    /// Only exists when `g(a + b) = g(a)·g(b)`, i.e. for exponential growth.
    pub fn rebase_factor(&self, shift: f64) -> Option<f64> {
        match *self {
            Self::Exponential { rate } | Self::FixedWindow { rate, .. } => {
                Some((-rate * shift.max(0.0)).exp())
            }
            Self::Polynomial { .. } => None,
        }
    }

    /// Whether `weight(a + b) = weight(a)·weight(b)` for every age.
    ///
    /// Only such functions allow an aggregate to be rescaled in O(1) when
    /// the reference time moves.
    pub fn is_multiplicative(&self) -> bool {
        matches!(self, Self::Exponential { .. })
    }

    /// Hard cutoff, if the function has one
    pub fn horizon(&self) -> Option<f64> {
        match *self {
            Self::FixedWindow { horizon, .. } => Some(horizon),
            _ => None,
        }
    }

    /// Short name of the variant
    pub fn name(&self) -> &'static str {
        match self {
            Self::Exponential { .. } => "exponential",
            Self::Polynomial { .. } => "polynomial",
            Self::FixedWindow { .. } => "fixed_window",
        }
    }
}

impl fmt::Display for DecayFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exponential { rate } => write!(f, "exponential(α={rate})"),
            Self::Polynomial { degree } => write!(f, "polynomial(β={degree})"),
            Self::FixedWindow { rate, horizon } => {
                write!(f, "fixed_window(α={rate}, horizon={horizon}s)")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn all() -> Vec<DecayFunction> {
        vec![
            DecayFunction::exponential(0.01).unwrap(),
            DecayFunction::exponential(3.0).unwrap(),
            DecayFunction::polynomial(2.0).unwrap(),
            DecayFunction::polynomial(0.5).unwrap(),
            DecayFunction::fixed_window(0.1, 30.0).unwrap(),
        ]
    }

    #[test]
    fn test_weight_at_zero_is_one() {
        for decay in all() {
            assert_eq!(decay.weight(0.0), 1.0, "{decay}");
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(DecayFunction::exponential(0.0).is_err());
        assert!(DecayFunction::exponential(-0.1).is_err());
        assert!(DecayFunction::polynomial(0.0).is_err());
        assert!(DecayFunction::polynomial(f64::NAN).is_err());
        assert!(DecayFunction::fixed_window(0.1, 0.0).is_err());
        assert!(DecayFunction::fixed_window(-0.1, 10.0).is_err());
    }

    #[test]
    fn test_polynomial_weight() {
        let decay = DecayFunction::polynomial(2.0).unwrap();
        assert_eq!(decay.weight(1.0), 0.25);
        assert_eq!(decay.weight(3.0), 0.0625);
    }

    #[test]
    fn test_fixed_window_cutoff() {
        let decay = DecayFunction::fixed_window(0.1, 10.0).unwrap();
        assert!(decay.weight(10.0) > 0.0);
        assert_eq!(decay.weight(10.001), 0.0);
        assert_eq!(decay.horizon(), Some(10.0));
    }

    #[test]
    fn test_negative_age_clamped() {
        for decay in all() {
            assert_eq!(decay.weight(-5.0), 1.0);
        }
    }

    #[test]
    fn test_only_exponential_is_multiplicative() {
        assert!(DecayFunction::exponential(0.2).unwrap().is_multiplicative());
        assert!(!DecayFunction::polynomial(2.0).unwrap().is_multiplicative());
        assert!(!DecayFunction::fixed_window(0.2, 5.0).unwrap().is_multiplicative());
    }

    #[test]
    fn test_exponential_landmark_weight_matches_age_weight() {
        let decay = DecayFunction::exponential(0.3).unwrap();
        let landmark_weight = decay.landmark_weight(4.0, 9.0);
        assert!((landmark_weight - decay.weight(5.0)).abs() < 1e-12);
    }

    #[test]
    fn test_polynomial_has_no_rebase() {
        assert!(DecayFunction::polynomial(2.0).unwrap().rebase_factor(1.0).is_none());
        let factor = DecayFunction::exponential(1.0)
            .unwrap()
            .rebase_factor(2.0)
            .unwrap();
        assert!((factor - (-2.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            DecayFunction::exponential(0.01).unwrap().to_string(),
            "exponential(α=0.01)"
        );
    }

    proptest! {
        #[test]
        fn prop_weight_non_increasing(
            index in 0usize..5,
            a in 0.0f64..1_000.0,
            b in 0.0f64..1_000.0,
        ) {
            let decay = all()[index];
            let (young, old) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(decay.weight(young) >= decay.weight(old));
            prop_assert!(decay.weight(old) >= 0.0);
            prop_assert!(decay.weight(young) <= 1.0);
        }

        #[test]
        fn prop_growth_non_decreasing(index in 0usize..5, a in 0.0f64..500.0, b in 0.0f64..500.0) {
            let decay = all()[index];
            let (early, late) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(decay.growth(early) <= decay.growth(late));
            prop_assert!(decay.growth(early) >= 1.0);
        }

        #[test]
        fn prop_exponential_is_multiplicative(rate in 0.001f64..2.0, a in 0.0f64..50.0, b in 0.0f64..50.0) {
            let decay = DecayFunction::exponential(rate).unwrap();
            let product = decay.weight(a) * decay.weight(b);
            prop_assert!((decay.weight(a + b) - product).abs() <= 1e-12);
        }
    }
}
