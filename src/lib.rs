//! Empirical law finder.
//!
//! Searches an ordered series for the smallest window size `T` at which the
//! rolling sum of the endogenous signal is non-negative everywhere, the lag
//! above which that keeps holding, and the same property over disjoint
//! windows.
//!
//! The core is `align` → `aggregate` → `search`; `data`, `report`,
//! `config` and `logging` are the I/O shell around it.

pub mod aggregate;
pub mod align;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod report;
pub mod search;

pub use aggregate::{aggregate, AggregateResult, AggregationMode};
pub use align::{align, OrderKey, OrderedSeries};
pub use error::{LawError, LawResult};
pub use search::{
    search, search_with_sink, EmergenceSearchResult, EmergenceState, StepFrame, StepKind, StepSink,
};
