//! Synthetic price table for trying the law finder without market data.
//!
//! Usage: synth [out.csv] [rows] [seed] [drift]
//!
//! Writes `DATE;CLOSE` rows of a geometric random walk with daily drift, in
//! the default input format of the `lawfinder` binary.

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::fmt::Write as _;

fn generate_closes(seed: u64, n: usize, start_price: f64, drift: f64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = start_price;
    let mut vol: f64 = 0.01;
    let mut series = Vec::with_capacity(n);
    for _ in 0..n {
        let regime_flip: f64 = rng.gen();
        if regime_flip < 0.02 {
            vol = (vol * 1.4).min(0.05);
        } else if regime_flip > 0.98 {
            vol = (vol * 0.7).max(0.004);
        }
        let noise: f64 = rng.gen_range(-1.0..1.0) * vol;
        price = (price * (1.0 + drift + noise)).max(1.0);
        series.push(price);
    }
    series
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let out = args.get(1).map(|s| s.as_str()).unwrap_or("data/synthetic.csv");
    let rows: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5000);
    let seed: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(42);
    let drift: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.0004);

    let start = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap_or_default();
    let mut body = String::from("DATE;CLOSE\n");
    for (i, close) in generate_closes(seed, rows, 100.0, drift).into_iter().enumerate() {
        let date = start + Duration::days(i as i64);
        writeln!(body, "{};{:.4}", date, close)?;
    }

    if let Some(dir) = std::path::Path::new(out).parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(out, body)?;
    println!("wrote {} rows to {} (seed {}, drift {})", rows, out, seed, drift);
    Ok(())
}
