//! Error taxonomy for the emergence search core.
//!
//! Every invalid state the core detects is reported through [`LawError`];
//! nothing is patched or retried. The I/O shell wraps these in
//! `anyhow::Error` through the blanket `std::error::Error` conversion.

pub type LawResult<T> = Result<T, LawError>;

#[derive(Debug, Clone, PartialEq)]
pub enum LawError {
    /// Mismatched input lengths or too few complete pairs after dropping
    /// missing data.
    InvalidInput(String),
    /// Lag outside `1..=len`, or a zero search step.
    InvalidLag { lag: usize, len: usize },
    /// Aggregation mode name other than `level` / `increase`.
    UndefinedMode(String),
}

impl std::error::Error for LawError {}

impl std::fmt::Display for LawError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LawError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            LawError::InvalidLag { lag, len } => {
                write!(f, "invalid lag {lag}: must satisfy 1 <= lag <= {len}")
            }
            LawError::UndefinedMode(mode) => {
                write!(f, "undefined aggregation mode {mode:?}: use \"level\" or \"increase\"")
            }
        }
    }
}
