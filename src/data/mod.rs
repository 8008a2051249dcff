//! Delimited-table input for the law finder.
//!
//! Reads a header + rows table, pulls out the endogenous and exogenous
//! columns, and derives the endogenous signal (raw column or next-period
//! log return). Missing or unparseable cells become `None` and drop out in
//! alignment.

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y", "%Y%m%d"];
const MISSING_MARKERS: [&str; 5] = ["", "na", "nan", "null", "n/a"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndoTransform {
    /// Use the column as-is.
    Raw,
    /// `ln(1 + pct_change)` of the following row.
    NextLogReturn,
}

impl FromStr for EndoTransform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "raw" => Ok(EndoTransform::Raw),
            "next_log_return" => Ok(EndoTransform::NextLogReturn),
            other => Err(anyhow!("unknown endogenous transform {:?}: use raw or next_log_return", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExoKind {
    Date,
    Number,
}

impl FromStr for ExoKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "date" => Ok(ExoKind::Date),
            "number" => Ok(ExoKind::Number),
            other => Err(anyhow!("unknown exogenous kind {:?}: use date or number", other)),
        }
    }
}

/// Parsed exogenous column, one entry per table row.
#[derive(Debug, Clone, PartialEq)]
pub enum ExoColumn {
    Dates(Vec<Option<NaiveDateTime>>),
    Numbers(Vec<Option<f64>>),
}

impl ExoColumn {
    pub fn missing(&self) -> usize {
        match self {
            ExoColumn::Dates(v) => v.iter().filter(|k| k.is_none()).count(),
            ExoColumn::Numbers(v) => v.iter().filter(|k| k.map_or(true, f64::is_nan)).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| self.headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
            .ok_or_else(|| anyhow!("column {:?} not found in {:?}", name, self.headers))
    }

    /// Cells of a column; short rows yield empty cells.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(name)?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).map(|s| s.as_str()).unwrap_or(""))
            .collect())
    }
}

/// Read a delimited table. Blank lines and `#` comments are skipped; the
/// first remaining line is the header.
pub fn read_table(path: &Path, delimiter: char) -> Result<Table> {
    let file = File::open(path).map_err(|e| anyhow!("failed to open {}: {}", path.display(), e))?;
    let mut headers: Vec<String> = Vec::new();
    let mut rows = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let cells: Vec<String> = trimmed
            .split(delimiter)
            .map(|s| s.trim().trim_matches('"').to_string())
            .collect();
        if headers.is_empty() {
            headers = cells;
        } else {
            rows.push(cells);
        }
    }
    if headers.is_empty() {
        return Err(anyhow!("{} has no header line", path.display()));
    }
    Ok(Table { headers, rows })
}

fn is_missing_cell(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim().to_lowercase().as_str())
}

pub fn parse_number(cell: &str) -> Option<f64> {
    if is_missing_cell(cell) {
        return None;
    }
    cell.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

pub fn parse_datetime(cell: &str) -> Option<NaiveDateTime> {
    let cell = cell.trim();
    if is_missing_cell(cell) {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cell, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(cell, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

pub fn parse_numbers(cells: &[&str]) -> Vec<Option<f64>> {
    cells.iter().map(|c| parse_number(c)).collect()
}

/// Log return of the following row: `ln(1 + (p[i+1] - p[i]) / p[i])`.
/// The last row, and rows next to a missing or zero price, are missing.
pub fn next_log_returns(prices: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| match (prices[i], prices.get(i + 1).copied().flatten()) {
            (Some(p0), Some(p1)) if p0 != 0.0 => {
                let r = ((p1 - p0) / p0).ln_1p();
                if r.is_finite() { Some(r) } else { None }
            }
            _ => None,
        })
        .collect()
}

pub fn endogenous_column(table: &Table, column: &str, transform: EndoTransform) -> Result<Vec<Option<f64>>> {
    let raw = parse_numbers(&table.column(column)?);
    Ok(match transform {
        EndoTransform::Raw => raw,
        EndoTransform::NextLogReturn => next_log_returns(&raw),
    })
}

pub fn exogenous_column(table: &Table, column: &str, kind: ExoKind) -> Result<ExoColumn> {
    let cells = table.column(column)?;
    Ok(match kind {
        ExoKind::Date => ExoColumn::Dates(cells.iter().map(|c| parse_datetime(c)).collect()),
        ExoKind::Number => ExoColumn::Numbers(parse_numbers(&cells)),
    })
}

// =============================================================================
// Dataset manifest
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub path: String,
    pub hash_sha256: String,
    pub row_count: u64,
    pub columns: Vec<String>,
    pub endo_column: String,
    pub exo_column: String,
    pub missing_endo: u64,
    pub missing_exo: u64,
    pub complete_rows: u64,
    pub key_min: Option<String>,
    pub key_max: Option<String>,
    pub warnings: Vec<String>,
}

pub fn build_manifest(
    path: &Path,
    table: &Table,
    endo: &[Option<f64>],
    exo: &ExoColumn,
    endo_column: &str,
    exo_column: &str,
) -> Result<DatasetManifest> {
    let mut warnings = Vec::new();
    let missing_endo = endo.iter().filter(|v| v.is_none()).count() as u64;
    let (complete_rows, key_min, key_max) = match exo {
        ExoColumn::Dates(keys) => {
            let present: Vec<&NaiveDateTime> = endo
                .iter()
                .zip(keys)
                .filter_map(|(v, k)| v.and(k.as_ref()))
                .collect();
            (
                present.len(),
                present.iter().min().map(|k| k.to_string()),
                present.iter().max().map(|k| k.to_string()),
            )
        }
        ExoColumn::Numbers(keys) => {
            let present: Vec<f64> = endo
                .iter()
                .zip(keys)
                .filter_map(|(v, k)| v.and(*k))
                .filter(|k| !k.is_nan())
                .collect();
            (
                present.len(),
                present.iter().copied().reduce(f64::min).map(|k| k.to_string()),
                present.iter().copied().reduce(f64::max).map(|k| k.to_string()),
            )
        }
    };
    let non_monotonic = match exo {
        ExoColumn::Dates(keys) => keys.iter().flatten().collect::<Vec<_>>().windows(2).any(|w| w[1] < w[0]),
        ExoColumn::Numbers(keys) => keys.iter().flatten().collect::<Vec<_>>().windows(2).any(|w| w[1] < w[0]),
    };
    if non_monotonic {
        warnings.push("exogenous column is not sorted; rows will be reordered".to_string());
    }
    if complete_rows < 2 {
        warnings.push(format!("only {} complete rows", complete_rows));
    }

    Ok(DatasetManifest {
        path: path.display().to_string(),
        hash_sha256: file_sha256(path)?,
        row_count: table.rows.len() as u64,
        columns: table.headers.clone(),
        endo_column: endo_column.to_string(),
        exo_column: exo_column.to_string(),
        missing_endo,
        missing_exo: exo.missing() as u64,
        complete_rows: complete_rows as u64,
        key_min,
        key_max,
        warnings,
    })
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn default_manifest_path(dataset_path: &Path) -> PathBuf {
    let mut p = dataset_path.to_path_buf();
    let fname = dataset_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset.csv");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}
