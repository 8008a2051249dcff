//! Law finder driver.
//!
//! Usage: lawfinder <table> [lag_step] [level|increase]
//! Remaining settings come from the environment (see `LawConfig::from_env`).

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::fmt::Display;
use std::path::Path;

use lawfinder::config::LawConfig;
use lawfinder::data::{endogenous_column, exogenous_column, file_sha256, read_table, ExoColumn};
use lawfinder::logging::{self, json_fields, log, log_search_summary, obj, v_str, Domain, Level};
use lawfinder::report::{render_summary, FrameWriter, ProgressLog};
use lawfinder::{align, search_with_sink, AggregationMode, OrderKey, StepFrame, StepSink};

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    dataset: &'a str,
    hash_sha256: String,
    first_key: Option<String>,
    last_key: Option<String>,
    config: &'a LawConfig,
    result: &'a lawfinder::EmergenceSearchResult,
    frames_written: usize,
    frame_failures: usize,
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cfg = LawConfig::from_env();
    cfg.apply_args(&args)?;
    let mode = cfg.mode()?;

    log(Level::Info, Domain::System, "start", json_fields(&cfg));

    let table = read_table(Path::new(&cfg.data_path), cfg.delimiter)?;
    let endo = endogenous_column(&table, &cfg.endo_column, cfg.endo_transform()?)?;
    let outcome = match exogenous_column(&table, &cfg.exo_column, cfg.exo_kind()?)? {
        ExoColumn::Dates(keys) => run(&cfg, mode, &endo, &keys),
        ExoColumn::Numbers(keys) => run(&cfg, mode, &endo, &keys),
    };
    if let Err(err) = &outcome {
        log(
            Level::Error,
            Domain::System,
            "failed",
            obj(&[("error", v_str(&err.to_string()))]),
        );
    }
    logging::flush();
    outcome
}

fn run<K>(cfg: &LawConfig, mode: AggregationMode, endo: &[Option<f64>], keys: &[Option<K>]) -> Result<()>
where
    K: OrderKey + Serialize + Display,
{
    let series = align(endo, keys)?;
    log(
        Level::Info,
        Domain::Data,
        "loaded",
        obj(&[
            ("path", v_str(&cfg.data_path)),
            ("rows", json!(endo.len())),
            ("aligned", json!(series.len())),
        ]),
    );

    let labels = cfg.labels();
    let locale = cfg.locale()?;
    let mut progress = ProgressLog;
    let mut frames = cfg
        .frame_dir
        .as_ref()
        .map(|dir| FrameWriter::new(dir, labels.clone(), locale));

    let result = search_with_sink(&series, cfg.lag_step, mode, &mut |frame: &StepFrame<'_, K>| {
        progress.on_step(frame);
        if let Some(writer) = frames.as_mut() {
            writer.on_step(frame);
        }
    })?;

    log_search_summary(Level::Info, json_fields(&result));
    print!("{}", render_summary(&result, locale));

    let report = RunReport {
        dataset: &cfg.data_path,
        hash_sha256: file_sha256(Path::new(&cfg.data_path))?,
        first_key: series.first_key().map(|k| k.to_string()),
        last_key: series.last_key().map(|k| k.to_string()),
        config: cfg,
        result: &result,
        frames_written: frames.as_ref().map(|w| w.written).unwrap_or(0),
        frame_failures: frames.as_ref().map(|w| w.failures).unwrap_or(0),
    };
    let report_path = Path::new(&cfg.report_path);
    if let Some(dir) = report_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(report_path, serde_json::to_string_pretty(&report)?)?;
    println!("\nJSON report: {}", report_path.display());
    Ok(())
}
