//! Loader → alignment → search, plus the file-writing sinks.

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use lawfinder::data::{
    build_manifest, endogenous_column, exogenous_column, read_table, EndoTransform, ExoColumn,
    ExoKind,
};
use lawfinder::report::{FrameWriter, Labels, Locale};
use lawfinder::{align, search, search_with_sink, AggregationMode, LawError, OrderedSeries};
use tempfile::TempDir;

/// `DATE;CLOSE` table of a price growing 1% per day from 2010-01-01.
fn write_growth_table(path: &Path, rows: usize, missing_row: Option<usize>) {
    let mut out = String::from("# synthetic\nDATE;CLOSE\n");
    let start = chrono::NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
    let mut price = 100.0f64;
    for i in 0..rows {
        let date = start + chrono::Duration::days(i as i64);
        if Some(i) == missing_row {
            out.push_str(&format!("{};NA\n", date));
        } else {
            out.push_str(&format!("{};{}\n", date, price));
        }
        price *= 1.01;
    }
    fs::write(path, out).unwrap();
}

fn date_keys(exo: ExoColumn) -> Vec<Option<NaiveDateTime>> {
    match exo {
        ExoColumn::Dates(keys) => keys,
        other => panic!("expected dates, got {:?}", other),
    }
}

#[test]
fn growth_table_emerges_at_first_lag() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("growth.csv");
    write_growth_table(&path, 200, None);

    let table = read_table(&path, ';').unwrap();
    assert_eq!(table.headers, vec!["DATE", "CLOSE"]);
    assert_eq!(table.rows.len(), 200);

    let endo = endogenous_column(&table, "CLOSE", EndoTransform::NextLogReturn).unwrap();
    let keys = date_keys(exogenous_column(&table, "DATE", ExoKind::Date).unwrap());
    let series = align(&endo, &keys).unwrap();
    // The last row has no next-day return.
    assert_eq!(series.len(), 199);

    // half = 99: lags 20 .. 90.
    let result = search(&series, 10, AggregationMode::Level).unwrap();
    assert_eq!(result.steps, 8);
    assert_eq!(result.min_emergence_lag, Some(20));
    assert_eq!(result.non_overlap_emergence_lag, Some(20));
}

#[test]
fn missing_price_drops_two_returns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gap.csv");
    write_growth_table(&path, 50, Some(10));

    let table = read_table(&path, ';').unwrap();
    let endo = endogenous_column(&table, "CLOSE", EndoTransform::NextLogReturn).unwrap();
    assert_eq!(endo[9], None);
    assert_eq!(endo[10], None);
    assert_eq!(endo[49], None);
    let exo = exogenous_column(&table, "DATE", ExoKind::Date).unwrap();
    let manifest = build_manifest(&path, &table, &endo, &exo, "CLOSE", "DATE").unwrap();
    assert_eq!(manifest.row_count, 50);
    assert_eq!(manifest.missing_endo, 3);
    assert_eq!(manifest.missing_exo, 0);
    assert_eq!(manifest.complete_rows, 47);
    assert_eq!(manifest.hash_sha256.len(), 64);
    assert_eq!(manifest.key_min.as_deref(), Some("2010-01-01 00:00:00"));
    assert!(manifest.warnings.is_empty());

    let series = align(&endo, &date_keys(exo)).unwrap();
    assert_eq!(series.len(), 47);
}

#[test]
fn unsorted_numeric_keys_are_reordered() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("numeric.csv");
    fs::write(&path, "x,y\n3,0.3\n1,0.1\n2,NaN\n,0.4\n0,0.0\n").unwrap();

    let table = read_table(&path, ',').unwrap();
    let endo = endogenous_column(&table, "y", EndoTransform::Raw).unwrap();
    let exo = exogenous_column(&table, "x", ExoKind::Number).unwrap();
    let manifest = build_manifest(&path, &table, &endo, &exo, "y", "x").unwrap();
    assert_eq!(manifest.complete_rows, 3);
    assert_eq!(manifest.warnings.len(), 1);

    let keys = match exo {
        ExoColumn::Numbers(keys) => keys,
        other => panic!("expected numbers, got {:?}", other),
    };
    let series = align(&endo, &keys).unwrap();
    assert_eq!(series.keys(), &[0.0, 1.0, 3.0]);
    assert_eq!(series.values(), &[0.0, 0.1, 0.3]);
}

#[test]
fn too_few_complete_rows_is_invalid_input() {
    let endo = vec![Some(1.0), None, None];
    let keys = vec![Some(1i64), Some(2), Some(3)];
    assert!(matches!(align(&endo, &keys), Err(LawError::InvalidInput(_))));
}

#[test]
fn missing_column_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cols.csv");
    fs::write(&path, "DATE;OPEN\n2010-01-01;1\n").unwrap();
    let table = read_table(&path, ';').unwrap();
    let err = endogenous_column(&table, "CLOSE", EndoTransform::Raw).unwrap_err();
    assert!(err.to_string().contains("CLOSE"));
}

#[test]
fn frame_writer_writes_every_step() {
    let dir = TempDir::new().unwrap();
    let frames = dir.path().join("frames");
    let series = OrderedSeries::from_values(&vec![0.001; 1000]).unwrap();
    let labels = Labels {
        des_endogen: "signal".to_string(),
        des_exogen: "position".to_string(),
    };
    let mut writer = FrameWriter::new(&frames, labels, Locale::En);
    let result = search_with_sink(&series, 100, AggregationMode::Level, &mut writer).unwrap();

    assert_eq!(result.steps, 3);
    assert_eq!(writer.written, 4);
    assert_eq!(writer.failures, 0);
    for name in ["frame-10001.json", "frame-10002.json", "frame-10003.json", "frame-summary.json"] {
        assert!(frames.join(name).exists(), "{} missing", name);
    }

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(frames.join("frame-10002.json")).unwrap()).unwrap();
    assert_eq!(doc["lag"], 300);
    assert_eq!(doc["kind"], "scan");
    assert_eq!(doc["state"]["min_emergence_lag"], 200);
    assert_eq!(doc["points"].as_array().unwrap().len(), 1000);
    assert!(doc["points"][0]["windowed"].is_null());
    assert!(doc["panel"][1].as_str().unwrap().starts_with("T = 300"));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(frames.join("frame-summary.json")).unwrap()).unwrap();
    assert_eq!(summary["kind"], "summary");
    assert_eq!(summary["lag"], 200);
}

#[test]
fn frame_write_failures_do_not_stop_search() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "file in the way").unwrap();

    let series = OrderedSeries::from_values(&vec![0.001; 1000]).unwrap();
    let mut writer = FrameWriter::new(&blocker, Labels::default(), Locale::En);
    let result = search_with_sink(&series, 100, AggregationMode::Level, &mut writer).unwrap();

    assert_eq!(result.min_emergence_lag, Some(200));
    assert_eq!(writer.written, 0);
    assert_eq!(writer.failures, 4);
}
