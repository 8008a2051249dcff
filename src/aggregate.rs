//! Rolling aggregates over an ordered series.
//!
//! For a lag `T` the aggregator produces the trailing `T`-element sum at
//! every position (`windowed`) and the same values restricted to positions
//! that are multiples of `T` (`sampled`, the non-overlapping windows).
//! Undefined entries are `None`; a window touching an undefined input is
//! itself undefined, there is no minimum-periods override.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::align::{OrderKey, OrderedSeries};
use crate::error::{LawError, LawResult};

/// Decimal places kept before the non-negativity comparison.
pub const ROUND_DECIMALS: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// Moving sum over the trailing window.
    Level,
    /// Moving sum minus the moving sum `lag` positions earlier.
    Increase,
}

impl AggregationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMode::Level => "level",
            AggregationMode::Increase => "increase",
        }
    }
}

impl FromStr for AggregationMode {
    type Err = LawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "level" => Ok(AggregationMode::Level),
            "increase" => Ok(AggregationMode::Increase),
            _ => Err(LawError::UndefinedMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregates for one lag, index-aligned with the series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub lag: usize,
    pub mode: AggregationMode,
    pub windowed: Vec<Option<f64>>,
    pub sampled: Vec<Option<f64>>,
}

impl AggregateResult {
    pub fn len(&self) -> usize {
        self.windowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windowed.is_empty()
    }

    pub fn windowed_all_non_negative(&self) -> bool {
        all_non_negative(&self.windowed)
    }

    pub fn sampled_all_non_negative(&self) -> bool {
        all_non_negative(&self.sampled)
    }

    /// Number of lag-sized windows beyond the first: `(len - lag) / lag`.
    pub fn window_ratio(&self) -> f64 {
        (self.len() as f64 - self.lag as f64) / self.lag as f64
    }
}

/// Compute the rolling aggregates of `series` at `lag`.
pub fn aggregate<K: OrderKey>(
    series: &OrderedSeries<K>,
    lag: usize,
    mode: AggregationMode,
) -> LawResult<AggregateResult> {
    let len = series.len();
    if lag == 0 || lag > len {
        return Err(LawError::InvalidLag { lag, len });
    }

    let values: Vec<Option<f64>> = series.values().iter().map(|v| Some(*v)).collect();
    let mut windowed = rolling_sum(&values, lag);
    if mode == AggregationMode::Increase {
        windowed = shifted_difference(&windowed, lag);
    }

    let sampled = windowed
        .iter()
        .enumerate()
        .map(|(i, v)| if i % lag == 0 { *v } else { None })
        .collect();

    Ok(AggregateResult { lag, mode, windowed, sampled })
}

/// Trailing sum over `lag` elements. Defined from index `lag - 1` on, and
/// only when no element inside the window is missing. Each window is summed
/// on its own so a value never leaks into windows that no longer hold it.
pub fn rolling_sum(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    if lag == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < lag {
                return None;
            }
            values[i + 1 - lag..=i].iter().try_fold(0.0, |acc, v| v.map(|v| acc + v))
        })
        .collect()
}

/// `values[i] - values[i - lag]`, undefined when either side is.
pub fn shifted_difference(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, current)| {
            if i < lag {
                return None;
            }
            match (current, values[i - lag]) {
                (Some(a), Some(b)) => Some(a - b),
                _ => None,
            }
        })
        .collect()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Smallest defined value, `None` when nothing is defined.
pub fn min_defined(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().fold(None, |acc, v| match acc {
        Some(m) if m <= v => Some(m),
        _ => Some(v),
    })
}

/// True when the rounded minimum of the defined values is `>= 0`.
/// A sequence without defined values passes vacuously.
pub fn all_non_negative(values: &[Option<f64>]) -> bool {
    match min_defined(values) {
        Some(min) => round_to(min, ROUND_DECIMALS) >= 0.0,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> OrderedSeries<usize> {
        OrderedSeries::from_values(values).unwrap()
    }

    #[test]
    fn test_level_window_sums() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let r = aggregate(&s, 2, AggregationMode::Level).unwrap();
        assert_eq!(r.windowed, vec![None, Some(3.0), Some(5.0), Some(7.0), Some(9.0)]);
        assert_eq!(r.sampled, vec![None, None, Some(5.0), None, Some(9.0)]);
    }

    #[test]
    fn test_increase_needs_two_windows() {
        let s = series(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        let r = aggregate(&s, 2, AggregationMode::Increase).unwrap();
        // level: [_, 2, 2, 3, 4, 4]
        assert_eq!(r.windowed, vec![None, None, None, Some(1.0), Some(2.0), Some(1.0)]);
        assert_eq!(r.sampled, vec![None, None, None, None, Some(2.0), None]);
    }

    #[test]
    fn test_lag_one_samples_everything() {
        let s = series(&[-1.0, 0.5, 2.0]);
        let r = aggregate(&s, 1, AggregationMode::Level).unwrap();
        assert_eq!(r.windowed, r.sampled);
        assert_eq!(r.windowed, vec![Some(-1.0), Some(0.5), Some(2.0)]);
    }

    #[test]
    fn test_lag_equal_to_length() {
        let s = series(&[1.0, 2.0, 3.0]);
        let r = aggregate(&s, 3, AggregationMode::Level).unwrap();
        assert_eq!(r.windowed, vec![None, None, Some(6.0)]);
        assert_eq!(r.sampled, vec![None, None, None]);
        assert!(r.sampled_all_non_negative());
    }

    #[test]
    fn test_invalid_lag() {
        let s = series(&[1.0, 2.0, 3.0]);
        assert_eq!(
            aggregate(&s, 0, AggregationMode::Level).unwrap_err(),
            LawError::InvalidLag { lag: 0, len: 3 }
        );
        assert_eq!(
            aggregate(&s, 4, AggregationMode::Increase).unwrap_err(),
            LawError::InvalidLag { lag: 4, len: 3 }
        );
    }

    #[test]
    fn test_missing_taints_window() {
        let values = vec![Some(1.0), None, Some(1.0), Some(1.0), Some(1.0)];
        let out = rolling_sum(&values, 2);
        assert_eq!(out, vec![None, None, None, Some(2.0), Some(2.0)]);
        let diff = shifted_difference(&out, 1);
        assert_eq!(diff, vec![None, None, None, None, Some(0.0)]);
    }

    #[test]
    fn test_window_sum_ignores_evicted_values() {
        let mut values = vec![Some(1e15), Some(0.01), Some(0.01)];
        values.extend(std::iter::repeat(Some(0.0)).take(20));
        let out = rolling_sum(&values, 2);
        assert_eq!(out[1], Some(1e15 + 0.01));
        assert_eq!(out[2], Some(0.02));
        assert_eq!(out[3], Some(0.01));
        assert!(out[4..].iter().all(|v| *v == Some(0.0)));
        assert!(all_non_negative(&out[3..]));
    }

    #[test]
    fn test_level_matches_direct_window_sums() {
        let raw: Vec<f64> = (0..60).map(|i| ((i * 37 % 11) as f64 - 5.0) * 10f64.powi(i % 7 - 3)).collect();
        let s = series(&raw);
        for lag in [1, 2, 5, 13, 60] {
            let r = aggregate(&s, lag, AggregationMode::Level).unwrap();
            for (i, got) in r.windowed.iter().enumerate() {
                let expected = if i + 1 < lag { None } else { Some(raw[i + 1 - lag..=i].iter().sum::<f64>()) };
                assert_eq!(*got, expected, "lag {} index {}", lag, i);
            }
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("level".parse::<AggregationMode>().unwrap(), AggregationMode::Level);
        assert_eq!(" Increase ".parse::<AggregationMode>().unwrap(), AggregationMode::Increase);
        assert_eq!(
            "median".parse::<AggregationMode>().unwrap_err(),
            LawError::UndefinedMode("median".to_string())
        );
    }

    #[test]
    fn test_rounding_absorbs_noise() {
        assert!(all_non_negative(&[Some(1.0), Some(-0.00004)]));
        assert!(!all_non_negative(&[Some(1.0), Some(-0.00006)]));
        assert!(all_non_negative(&[None, None]));
        assert_eq!(min_defined(&[None, Some(2.0), Some(-3.0), None]), Some(-3.0));
        assert_eq!(round_to(1.23456, 4), 1.2346);
    }

    #[test]
    fn test_window_ratio() {
        let s = series(&[0.0; 10]);
        let r = aggregate(&s, 4, AggregationMode::Level).unwrap();
        assert_eq!(r.window_ratio(), 1.5);
    }
}
