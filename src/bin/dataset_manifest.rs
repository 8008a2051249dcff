use lawfinder::config::LawConfig;
use lawfinder::data::{build_manifest, default_manifest_path, endogenous_column, exogenous_column, read_table};
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let mut cfg = LawConfig::from_env();
    if let Some(path) = env::args().nth(1) {
        cfg.data_path = path;
    }
    let path = PathBuf::from(&cfg.data_path);

    let table = match read_table(&path, cfg.delimiter) {
        Ok(t) => t,
        Err(err) => {
            eprintln!("read failed: {}", err);
            std::process::exit(1);
        }
    };

    let columns = cfg.endo_transform().and_then(|transform| {
        let endo = endogenous_column(&table, &cfg.endo_column, transform)?;
        let exo = exogenous_column(&table, &cfg.exo_column, cfg.exo_kind()?)?;
        Ok((endo, exo))
    });
    let (endo, exo) = match columns {
        Ok(c) => c,
        Err(err) => {
            eprintln!("column check failed: {}", err);
            eprintln!("available columns: {:?}", table.headers);
            std::process::exit(2);
        }
    };

    let manifest = match build_manifest(&path, &table, &endo, &exo, &cfg.endo_column, &cfg.exo_column) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("analysis failed: {}", err);
            std::process::exit(3);
        }
    };
    if !manifest.warnings.is_empty() {
        eprintln!("data_warnings: {:?}", manifest.warnings);
    }

    let out_path = default_manifest_path(&path);
    let payload = match serde_json::to_string_pretty(&manifest) {
        Ok(p) => p,
        Err(err) => {
            eprintln!("serialize failed: {}", err);
            std::process::exit(4);
        }
    };
    if let Err(err) = fs::write(&out_path, payload) {
        eprintln!("failed to write {}: {}", out_path.display(), err);
        std::process::exit(4);
    }
    println!("wrote manifest {}", out_path.display());
}
