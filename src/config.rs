use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::aggregate::AggregationMode;
use crate::data::{EndoTransform, ExoKind};
use crate::error::LawResult;
use crate::report::{Labels, Locale};

/// Run configuration. Every field comes from an env var with a default;
/// the driver's positional arguments override the first three.
#[derive(Debug, Clone, Serialize)]
pub struct LawConfig {
    pub data_path: String,
    pub lag_step: usize,
    /// Kept as text so an unknown name surfaces as `UndefinedMode`.
    pub mode_name: String,
    pub delimiter: char,
    pub endo_column: String,
    pub exo_column: String,
    pub endo_transform: String,
    pub exo_kind: String,
    pub frame_dir: Option<String>,
    pub des_endogen: String,
    pub des_exogen: String,
    pub locale: String,
    pub report_path: String,
}

impl LawConfig {
    pub fn from_env() -> Self {
        Self {
            data_path: std::env::var("DATA_PATH").unwrap_or_else(|_| "data.csv".to_string()),
            lag_step: std::env::var("LAG_STEP").ok().and_then(|v| v.parse().ok()).unwrap_or(250),
            mode_name: std::env::var("AGG_MODE").unwrap_or_else(|_| "level".to_string()),
            delimiter: std::env::var("DELIMITER").ok().and_then(|v| v.chars().next()).unwrap_or(';'),
            endo_column: std::env::var("ENDO_COLUMN").unwrap_or_else(|_| "CLOSE".to_string()),
            exo_column: std::env::var("EXO_COLUMN").unwrap_or_else(|_| "DATE".to_string()),
            endo_transform: std::env::var("ENDO_TRANSFORM").unwrap_or_else(|_| "next_log_return".to_string()),
            exo_kind: std::env::var("EXO_KIND").unwrap_or_else(|_| "date".to_string()),
            frame_dir: std::env::var("FRAME_DIR").ok().filter(|v| !v.trim().is_empty()),
            des_endogen: std::env::var("DES_ENDOGEN").unwrap_or_else(|_| "endogenous variable".to_string()),
            des_exogen: std::env::var("DES_EXOGEN").unwrap_or_else(|_| "exogenous variable".to_string()),
            locale: std::env::var("REPORT_LOCALE").unwrap_or_else(|_| "en".to_string()),
            report_path: std::env::var("REPORT_PATH").unwrap_or_else(|_| "out/lawfinder/report.json".to_string()),
        }
    }

    /// Positional overrides: `<csv> [lag_step] [mode]`.
    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        if let Some(path) = args.first() {
            self.data_path = path.clone();
        }
        if let Some(step) = args.get(1) {
            self.lag_step = step
                .parse()
                .map_err(|e| anyhow!("bad lag_step {:?}: {}", step, e))?;
        }
        if let Some(mode) = args.get(2) {
            self.mode_name = mode.clone();
        }
        Ok(())
    }

    pub fn mode(&self) -> LawResult<AggregationMode> {
        self.mode_name.parse()
    }

    pub fn endo_transform(&self) -> Result<EndoTransform> {
        self.endo_transform.parse()
    }

    pub fn exo_kind(&self) -> Result<ExoKind> {
        self.exo_kind.parse()
    }

    pub fn locale(&self) -> Result<Locale> {
        self.locale.parse()
    }

    pub fn labels(&self) -> Labels {
        Labels {
            des_endogen: self.des_endogen.clone(),
            des_exogen: self.des_exogen.clone(),
        }
    }
}
