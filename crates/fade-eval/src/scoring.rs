//! Scoring functions

use std::collections::HashSet;

/// Floor for the relative-error denominator
pub const DEFAULT_EPSILON: f64 = 1e-12;

/// `|approx − exact| / max(|exact|, ε)`
pub fn relative_error(approx: f64, exact: f64, epsilon: f64) -> f64 {
    (approx - exact).abs() / exact.abs().max(epsilon)
}

/// Jaccard overlap of two key sets; two empty sets match perfectly.
pub fn jaccard<S: AsRef<str>>(approx: &[S], exact: &[S]) -> f64 {
    let approx: HashSet<&str> = approx.iter().map(AsRef::as_ref).collect();
    let exact: HashSet<&str> = exact.iter().map(AsRef::as_ref).collect();

    let union = approx.union(&exact).count();
    if union == 0 {
        return 1.0;
    }
    approx.intersection(&exact).count() as f64 / union as f64
}

/// Value at the given percentile (0–100) of an ascending slice
pub(crate) fn percentile(sorted: &[f64], pct: usize) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted[((sorted.len() * pct) / 100).min(sorted.len() - 1)]
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_relative_error() {
        assert_eq!(relative_error(110.0, 100.0, DEFAULT_EPSILON), 0.1);
        assert_eq!(relative_error(0.0, 0.0, DEFAULT_EPSILON), 0.0);
        // Exact zero falls back to the epsilon floor
        assert_eq!(relative_error(1e-12, 0.0, DEFAULT_EPSILON), 1.0);
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard(&["a", "b"], &["b", "a"]), 1.0);
        assert_eq!(jaccard(&["a", "b"], &["b", "c"]), 1.0 / 3.0);
        assert_eq!(jaccard(&["a"], &["b"]), 0.0);
        let empty: [&str; 0] = [];
        assert_eq!(jaccard(&empty, &empty), 1.0);
    }

    #[test]
    fn test_percentile() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&sorted, 50), 6.0);
        assert_eq!(percentile(&sorted, 95), 10.0);
        assert_eq!(percentile(&[], 50), 0.0);
    }

    proptest! {
        #[test]
        fn prop_relative_error_non_negative(approx in -1e9f64..1e9, exact in -1e9f64..1e9) {
            prop_assert!(relative_error(approx, exact, DEFAULT_EPSILON) >= 0.0);
            prop_assert_eq!(relative_error(exact, exact, DEFAULT_EPSILON), 0.0);
        }

        #[test]
        fn prop_jaccard_in_unit_interval(
            approx in prop::collection::vec("[a-e]", 0..6),
            exact in prop::collection::vec("[a-e]", 0..6),
        ) {
            let score = jaccard(&approx[..], &exact[..]);
            prop_assert!((0.0..=1.0).contains(&score));
            prop_assert_eq!(score, jaccard(&exact[..], &approx[..]));
            prop_assert_eq!(jaccard(&exact[..], &exact[..]), 1.0);
        }

        #[test]
        fn prop_percentile_is_a_sample(
            mut samples in prop::collection::vec(0.0f64..1e3, 1..50),
            pct in 0usize..=100,
        ) {
            samples.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let value = percentile(&samples, pct);
            prop_assert!(samples.contains(&value));
            prop_assert!(value >= samples[0] && value <= samples[samples.len() - 1]);
        }
    }
}
