//! Emergence search: scan increasing lags for the non-negativity property.
//!
//! Starting from `lag_step`, the scan adds `lag_step` before every test and
//! stops once `lag + lag_step` reaches half the series length, so the first
//! lag tested is `2 * lag_step`. Each step aggregates the series, folds the
//! outcome into an [`EmergenceState`] and hands a [`StepFrame`] to the
//! caller's [`StepSink`]. Sinks observe only; they cannot change the scan.

use serde::Serialize;
use serde_json::Value;

use crate::aggregate::{aggregate, min_defined, AggregateResult, AggregationMode};
use crate::align::{OrderKey, OrderedSeries};
use crate::error::{LawError, LawResult};
use crate::logging::{
    json_fields, log_emergence, log_lag_step, log_search_summary, Level, ProfileScope,
};

/// Emergence bookkeeping across lag steps. `None` means not reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmergenceState {
    /// First lag whose windowed aggregates were all non-negative.
    pub min_emergence_lag: Option<usize>,
    /// Lag above which the property is taken to hold for every greater lag.
    pub max_emergence_lag: Option<usize>,
    /// First lag whose sampled (non-overlapping) aggregates were all non-negative.
    pub non_overlap_emergence_lag: Option<usize>,
    /// Set by a failure after emergence; the next success moves the max lag.
    pub awaiting_extension: bool,
}

impl EmergenceState {
    /// Fold one lag's outcome into the state.
    ///
    /// Consecutive successes after the first do not move
    /// `max_emergence_lag`; only a success following a failure does.
    pub fn record(&mut self, lag: usize, windowed_non_negative: bool, sampled_non_negative: bool) {
        if windowed_non_negative {
            if self.min_emergence_lag.is_none() {
                self.min_emergence_lag = Some(lag);
                self.max_emergence_lag = Some(lag);
                log_emergence("min", lag);
            } else if self.awaiting_extension {
                self.max_emergence_lag = Some(lag);
                self.awaiting_extension = false;
                log_emergence("max", lag);
            }
        } else if self.min_emergence_lag.is_some() {
            self.awaiting_extension = true;
        }

        if sampled_non_negative && self.non_overlap_emergence_lag.is_none() {
            self.non_overlap_emergence_lag = Some(lag);
            log_emergence("non_overlap", lag);
        }
    }

    /// `(len - min_lag) / min_lag`, or `None` before emergence.
    pub fn verification_degree(&self, series_len: usize) -> Option<f64> {
        match self.min_emergence_lag {
            Some(min_lag) if min_lag > 0 => {
                Some((series_len as f64 - min_lag as f64) / min_lag as f64)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// One lag of the scan.
    Scan,
    /// Re-aggregation at the minimum emergence lag after the scan.
    Summary,
}

/// What a sink sees at every step.
#[derive(Debug, Clone, Copy)]
pub struct StepFrame<'a, K> {
    pub kind: StepKind,
    /// 1-based scan iteration; the summary frame repeats the last one.
    pub index: usize,
    pub lag: usize,
    pub series: &'a OrderedSeries<K>,
    pub result: &'a AggregateResult,
    pub state: EmergenceState,
}

impl<K: OrderKey> StepFrame<'_, K> {
    pub fn window_ratio(&self) -> f64 {
        self.result.window_ratio()
    }

    pub fn verification_degree(&self) -> Option<f64> {
        self.state.verification_degree(self.series.len())
    }
}

/// Observer of the scan. Must not fail the search; errors stay in the sink.
pub trait StepSink<K> {
    fn on_step(&mut self, frame: &StepFrame<'_, K>);
}

impl<K, F> StepSink<K> for F
where
    F: FnMut(&StepFrame<'_, K>),
{
    fn on_step(&mut self, frame: &StepFrame<'_, K>) {
        self(frame)
    }
}

/// Final figures of a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergenceSearchResult {
    pub series_len: usize,
    pub lag_step: usize,
    pub mode: AggregationMode,
    pub steps: usize,
    pub min_emergence_lag: Option<usize>,
    pub max_emergence_lag: Option<usize>,
    pub non_overlap_emergence_lag: Option<usize>,
    pub verification_degree: Option<f64>,
}

impl EmergenceSearchResult {
    pub fn emergence_reached(&self) -> bool {
        self.min_emergence_lag.is_some()
    }
}

/// Lags visited by a scan over `series_len` points, in order.
pub fn scan_lags(series_len: usize, lag_step: usize) -> Vec<usize> {
    let mut lags = Vec::new();
    if lag_step == 0 {
        return lags;
    }
    let half = series_len / 2;
    let mut lag = lag_step;
    while lag < half.saturating_sub(lag_step) {
        lag += lag_step;
        lags.push(lag);
    }
    lags
}

/// Run the scan without an observer.
pub fn search<K: OrderKey>(
    series: &OrderedSeries<K>,
    lag_step: usize,
    mode: AggregationMode,
) -> LawResult<EmergenceSearchResult> {
    search_with_sink(series, lag_step, mode, &mut |_: &StepFrame<'_, K>| {})
}

/// Run the scan, emitting a frame per lag and a summary frame at the
/// minimum emergence lag when one was found.
pub fn search_with_sink<K, S>(
    series: &OrderedSeries<K>,
    lag_step: usize,
    mode: AggregationMode,
    sink: &mut S,
) -> LawResult<EmergenceSearchResult>
where
    K: OrderKey,
    S: StepSink<K> + ?Sized,
{
    if lag_step == 0 {
        return Err(LawError::InvalidLag { lag: 0, len: series.len() });
    }
    let _scope = ProfileScope::with_context(
        "search",
        "search",
        &[("series_len", Value::from(series.len())), ("lag_step", Value::from(lag_step))],
    );

    let mut state = EmergenceState::default();
    let lags = scan_lags(series.len(), lag_step);
    for (i, &lag) in lags.iter().enumerate() {
        let result = aggregate(series, lag, mode)?;
        let windowed_ok = result.windowed_all_non_negative();
        let sampled_ok = result.sampled_all_non_negative();
        state.record(lag, windowed_ok, sampled_ok);
        log_lag_step(lag, windowed_ok, sampled_ok, min_defined(&result.windowed));

        sink.on_step(&StepFrame {
            kind: StepKind::Scan,
            index: i + 1,
            lag,
            series,
            result: &result,
            state,
        });
    }

    if let Some(min_lag) = state.min_emergence_lag {
        let result = aggregate(series, min_lag, mode)?;
        sink.on_step(&StepFrame {
            kind: StepKind::Summary,
            index: lags.len(),
            lag: min_lag,
            series,
            result: &result,
            state,
        });
    }

    let outcome = EmergenceSearchResult {
        series_len: series.len(),
        lag_step,
        mode,
        steps: lags.len(),
        min_emergence_lag: state.min_emergence_lag,
        max_emergence_lag: state.max_emergence_lag,
        non_overlap_emergence_lag: state.non_overlap_emergence_lag,
        verification_degree: state.verification_degree(series.len()),
    };
    log_search_summary(Level::Debug, json_fields(&outcome));
    Ok(outcome)
}
