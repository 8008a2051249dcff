//! Reporting shell around the search: text panels, the console summary,
//! per-step frame files and progress logging.
//!
//! Everything here observes the search through [`StepSink`]; failures are
//! logged and counted, never handed back to the scan.

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::aggregate::AggregationMode;
use crate::align::OrderKey;
use crate::logging::{json_fields, log, log_frame_error, obj, v_num, Domain, Level};
use crate::search::{EmergenceSearchResult, EmergenceState, StepFrame, StepKind, StepSink};

/// First frame number; frame `i` of a scan is written as `FRAME_BASE + i`.
pub const FRAME_BASE: usize = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Labels {
    pub des_endogen: String,
    pub des_exogen: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    De,
}

impl FromStr for Locale {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "de" => Ok(Locale::De),
            other => Err(anyhow!("unsupported report locale {:?}: use en or de", other)),
        }
    }
}

struct Texts {
    yes: &'static str,
    no: &'static str,
    relation: &'static str,
    order: &'static str,
    true_min: &'static str,
    true_above: &'static str,
    degree: &'static str,
    window: &'static str,
    reached: &'static str,
    non_overlap_panel: &'static str,
    non_overlap_summary: &'static str,
}

impl Locale {
    fn texts(&self) -> Texts {
        match self {
            Locale::En => Texts {
                yes: "yes",
                no: " no",
                relation: "Relation",
                order: "Order",
                true_min: "True for T (min)",
                true_above: "True for all T above",
                degree: "Degree of inductive Verification",
                window: "Window",
                reached: "Emergence reached",
                non_overlap_panel: "Emergence in non-overlapping\nsequences reached",
                non_overlap_summary: "Emergence in non-overlapping sequences reached",
            },
            Locale::De => Texts {
                yes: " ja",
                no: "nein",
                relation: "Zusammenhang",
                order: "Ordnung",
                true_min: "Gültig für T (min)",
                true_above: "Gültig für alle T über",
                degree: "Grad der induktiven Bestätigung",
                window: "Fenster",
                reached: "Emergenz erreicht",
                non_overlap_panel: "Emergenz in nicht-überlappenden\nSequenzen erreicht",
                non_overlap_summary: "Emergenz in nicht-überlappenden Sequenzen erreicht",
            },
        }
    }
}

fn fmt_lag(lag: Option<usize>) -> String {
    lag.map(|l| format!("{:5}", l)).unwrap_or_else(|| "  n/a".to_string())
}

fn fmt_ratio(value: Option<f64>) -> String {
    value.map(|v| format!("{:5.1}", v)).unwrap_or_else(|| "  n/a".to_string())
}

fn yes_no(t: &Texts, flag: bool) -> &'static str {
    if flag {
        t.yes
    } else {
        t.no
    }
}

/// The two chart text boxes for one step: the law panel and the lag panel.
pub fn render_panel(
    lag: usize,
    series_len: usize,
    state: &EmergenceState,
    labels: &Labels,
    locale: Locale,
) -> [String; 2] {
    let t = locale.texts();
    let window = (series_len as f64 - lag as f64) / lag.max(1) as f64;
    let law = format!(
        "{}: {}\n{}: {}\n{} = {}\n{} = {}\n{}: {}   ( {}: {} )",
        t.relation,
        labels.des_endogen,
        t.order,
        labels.des_exogen,
        t.true_min,
        fmt_lag(state.min_emergence_lag),
        t.true_above,
        fmt_lag(state.max_emergence_lag),
        t.degree,
        fmt_ratio(state.verification_degree(series_len)),
        t.window,
        fmt_ratio(Some(window)),
    );
    let step = format!(
        "T = {}\n{}: {}\n{}: {}\n",
        lag,
        t.reached,
        yes_no(&t, state.min_emergence_lag.is_some()),
        t.non_overlap_panel,
        yes_no(&t, state.non_overlap_emergence_lag.is_some()),
    );
    [law, step]
}

/// Final console summary.
pub fn render_summary(result: &EmergenceSearchResult, locale: Locale) -> String {
    let t = locale.texts();
    format!(
        "{}: {}\n{}: {}\n{}: {}\n{}: {}\n{}: {}\n",
        t.reached,
        yes_no(&t, result.emergence_reached()),
        t.true_min,
        fmt_lag(result.min_emergence_lag),
        t.true_above,
        fmt_lag(result.max_emergence_lag),
        t.non_overlap_summary,
        fmt_lag(result.non_overlap_emergence_lag),
        t.degree,
        fmt_ratio(result.verification_degree),
    )
}

// =============================================================================
// Frame files
// =============================================================================

#[derive(Debug, Serialize)]
struct FramePoint<'a, K> {
    key: &'a K,
    windowed: Option<f64>,
    sampled: Option<f64>,
}

#[derive(Debug, Serialize)]
struct FrameDoc<'a, K> {
    kind: StepKind,
    index: usize,
    lag: usize,
    mode: AggregationMode,
    series_len: usize,
    window_ratio: f64,
    verification_degree: Option<f64>,
    state: EmergenceState,
    panel: [String; 2],
    points: Vec<FramePoint<'a, K>>,
}

/// Writes one JSON document per step into a directory.
#[derive(Debug, Clone)]
pub struct FrameWriter {
    dir: PathBuf,
    labels: Labels,
    locale: Locale,
    pub written: usize,
    pub failures: usize,
}

impl FrameWriter {
    pub fn new(dir: impl AsRef<Path>, labels: Labels, locale: Locale) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            labels,
            locale,
            written: 0,
            failures: 0,
        }
    }

    pub fn frame_path(&self, kind: StepKind, index: usize) -> PathBuf {
        match kind {
            StepKind::Scan => self.dir.join(format!("frame-{}.json", FRAME_BASE + index)),
            StepKind::Summary => self.dir.join("frame-summary.json"),
        }
    }

    fn write<K: OrderKey + Serialize>(&self, frame: &StepFrame<'_, K>) -> Result<PathBuf> {
        let points = frame
            .series
            .keys()
            .iter()
            .zip(frame.result.windowed.iter().zip(frame.result.sampled.iter()))
            .map(|(key, (w, s))| FramePoint { key, windowed: *w, sampled: *s })
            .collect();
        let doc = FrameDoc {
            kind: frame.kind,
            index: frame.index,
            lag: frame.lag,
            mode: frame.result.mode,
            series_len: frame.series.len(),
            window_ratio: frame.window_ratio(),
            verification_degree: frame.verification_degree(),
            state: frame.state,
            panel: render_panel(frame.lag, frame.series.len(), &frame.state, &self.labels, self.locale),
            points,
        };
        fs::create_dir_all(&self.dir)?;
        let path = self.frame_path(frame.kind, frame.index);
        fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
        Ok(path)
    }
}

impl<K: OrderKey + Serialize> StepSink<K> for FrameWriter {
    fn on_step(&mut self, frame: &StepFrame<'_, K>) {
        match self.write(frame) {
            Ok(_) => self.written += 1,
            Err(err) => {
                self.failures += 1;
                let path = self.frame_path(frame.kind, frame.index);
                log_frame_error(&path.display().to_string(), &err.to_string());
            }
        }
    }
}

// =============================================================================
// Progress log
// =============================================================================

/// Logs every step at info level in the report domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressLog;

impl<K: OrderKey> StepSink<K> for ProgressLog {
    fn on_step(&mut self, frame: &StepFrame<'_, K>) {
        let mut fields = json_fields(&frame.state);
        fields.extend(obj(&[
            ("kind", json!(frame.kind)),
            ("index", json!(frame.index)),
            ("lag", json!(frame.lag)),
            ("window_ratio", v_num(frame.window_ratio())),
            ("emergence_now", json!(frame.result.windowed_all_non_negative())),
        ]));
        log(Level::Info, Domain::Report, "step", fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Labels {
        Labels {
            des_endogen: "SPY log return of next trading day".to_string(),
            des_exogen: "Date".to_string(),
        }
    }

    fn result(min: Option<usize>) -> EmergenceSearchResult {
        EmergenceSearchResult {
            series_len: 1000,
            lag_step: 100,
            mode: AggregationMode::Level,
            steps: 3,
            min_emergence_lag: min,
            max_emergence_lag: min,
            non_overlap_emergence_lag: None,
            verification_degree: min.map(|m| (1000.0 - m as f64) / m as f64),
        }
    }

    #[test]
    fn test_summary_with_emergence() {
        let text = render_summary(&result(Some(200)), Locale::En);
        assert!(text.contains("Emergence reached: yes"));
        assert!(text.contains("True for T (min):   200"));
        assert!(text.contains("True for all T above:   200"));
        assert!(text.contains("non-overlapping sequences reached:   n/a"));
        assert!(text.contains("Degree of inductive Verification:   4.0"));
    }

    #[test]
    fn test_summary_without_emergence() {
        let text = render_summary(&result(None), Locale::En);
        assert!(text.contains("Emergence reached:  no"));
        assert!(text.contains("True for T (min):   n/a"));
        assert!(text.contains("Degree of inductive Verification:   n/a"));
    }

    #[test]
    fn test_panel_texts() {
        let state = EmergenceState {
            min_emergence_lag: Some(500),
            max_emergence_lag: Some(500),
            non_overlap_emergence_lag: None,
            awaiting_extension: true,
        };
        let [law, step] = render_panel(750, 2000, &state, &labels(), Locale::En);
        assert!(law.starts_with("Relation: SPY log return of next trading day\nOrder: Date\n"));
        assert!(law.contains("True for T (min) =   500"));
        assert!(law.contains("Degree of inductive Verification:   3.0   ( Window:   1.7 )"));
        assert_eq!(
            step,
            "T = 750\nEmergence reached: yes\nEmergence in non-overlapping\nsequences reached:  no\n"
        );
    }

    #[test]
    fn test_german_summary() {
        let text = render_summary(&result(Some(200)), Locale::De);
        assert!(text.contains("Emergenz erreicht:  ja"));
        assert!(text.contains("Gültig für T (min):   200"));
    }

    #[test]
    fn test_locale_parsing() {
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn test_frame_paths() {
        let writer = FrameWriter::new("out/frames", labels(), Locale::En);
        assert_eq!(writer.frame_path(StepKind::Scan, 1), PathBuf::from("out/frames/frame-10001.json"));
        assert_eq!(writer.frame_path(StepKind::Summary, 7), PathBuf::from("out/frames/frame-summary.json"));
    }
}
