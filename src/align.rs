//! Alignment of the endogenous signal against the exogenous order key.
//!
//! Pairs the two input columns position by position, drops every pair with a
//! missing side, and sorts what remains by order key. Equal keys keep their
//! input order (stable sort), so the result is deterministic.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::{LawError, LawResult};
use crate::logging::{log_alignment, ProfileScope};

/// Minimum number of complete pairs a series needs for one full window.
pub const MIN_ALIGNED_PAIRS: usize = 2;

/// A value usable as the exogenous ordering variable.
pub trait OrderKey: PartialOrd + Clone {
    /// Present values that still carry no order (e.g. NaN).
    fn is_missing(&self) -> bool {
        false
    }
}

impl OrderKey for f64 {
    fn is_missing(&self) -> bool {
        self.is_nan()
    }
}

impl OrderKey for i64 {}
impl OrderKey for u64 {}
impl OrderKey for usize {}
impl OrderKey for NaiveDate {}
impl OrderKey for NaiveDateTime {}

/// Endogenous values sorted ascending by their order key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderedSeries<K> {
    keys: Vec<K>,
    values: Vec<f64>,
}

impl<K: OrderKey> OrderedSeries<K> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, f64)> + '_ {
        self.keys.iter().zip(self.values.iter().copied())
    }

    pub fn first_key(&self) -> Option<&K> {
        self.keys.first()
    }

    pub fn last_key(&self) -> Option<&K> {
        self.keys.last()
    }
}

impl OrderedSeries<usize> {
    /// Series keyed by input position. Missing values still drop out.
    pub fn from_values(values: &[f64]) -> LawResult<Self> {
        let endogenous: Vec<Option<f64>> = values.iter().map(|v| Some(*v)).collect();
        let exogenous: Vec<Option<usize>> = (0..values.len()).map(Some).collect();
        align(&endogenous, &exogenous)
    }
}

/// Pair, filter and sort the endogenous values by the exogenous key.
pub fn align<K: OrderKey>(
    endogenous: &[Option<f64>],
    exogenous: &[Option<K>],
) -> LawResult<OrderedSeries<K>> {
    let _scope = ProfileScope::new("align", "align");
    if endogenous.len() != exogenous.len() {
        return Err(LawError::InvalidInput(format!(
            "length mismatch: {} endogenous vs {} exogenous values",
            endogenous.len(),
            exogenous.len()
        )));
    }

    let mut pairs: Vec<(K, f64)> = endogenous
        .iter()
        .zip(exogenous.iter())
        .filter_map(|(value, key)| match (value, key) {
            (Some(v), Some(k)) if !v.is_nan() && !k.is_missing() => Some((k.clone(), *v)),
            _ => None,
        })
        .collect();

    if pairs.len() < MIN_ALIGNED_PAIRS {
        return Err(LawError::InvalidInput(format!(
            "need at least {} complete pairs, got {}",
            MIN_ALIGNED_PAIRS,
            pairs.len()
        )));
    }

    // Missing keys are gone, so partial_cmp is total here.
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    log_alignment(endogenous.len(), pairs.len());

    let (keys, values) = pairs.into_iter().unzip();
    Ok(OrderedSeries { keys, values })
}
