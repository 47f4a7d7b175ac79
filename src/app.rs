use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::awards::{Awards, SeasonSnapshot, compute_awards};
use crate::config::{WrappedConfig, parse_db_path_arg};
use crate::export::{ExportReport, export_awards_json, export_awards_xlsx};
use crate::ingest::{IngestSummary, collect_season};
use crate::players::PlayerNames;
use crate::standings::{StandingRow, latest_month, monthly_standings};
use crate::store::Store;

/// Loads `.env.local`/`.env` and installs the log subscriber (`RUST_LOG`, default `info`).
pub fn init() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

pub fn resolve_db_path(config: &WrappedConfig) -> Result<PathBuf> {
    parse_db_path_arg()
        .or_else(|| config.resolve_db_path())
        .context("unable to resolve sqlite path")
}

pub fn run_collect(config: &WrappedConfig, db_path: &Path) -> Result<IngestSummary> {
    tracing::info!(season = config.season, db = %db_path.display(), "starting data collection");
    let mut store = Store::open(db_path)?;
    let today = chrono::Local::now().date_naive();
    let summary = collect_season(config, &mut store, today)?;
    tracing::info!(
        maps = summary.maps_upserted,
        runs = summary.runs_upserted,
        "data collection complete"
    );
    Ok(summary)
}

pub struct Report {
    pub awards: Awards,
    pub standings: Vec<StandingRow>,
}

pub fn build_report(store: &Store, season: i32) -> Result<Report> {
    let snapshot = SeasonSnapshot::load(store, season)?;
    let awards = compute_awards(&snapshot);
    let standings = latest_month(&snapshot)
        .map(|month| monthly_standings(&snapshot, month))
        .unwrap_or_default();
    Ok(Report { awards, standings })
}

pub fn run_generate(config: &WrappedConfig, db_path: &Path, out: &Path) -> Result<ExportReport> {
    let store = Store::open(db_path)?;
    let report = build_report(&store, config.season)?;
    let names = PlayerNames::load_or_default(&config.users_file)?;
    let exported = export_awards_xlsx(out, &report.awards, &report.standings, &names)?;
    let json_out = out.with_extension("json");
    export_awards_json(&json_out, &report.awards, &report.standings)?;
    tracing::info!(
        out = %out.display(),
        json = %json_out.display(),
        sheets = exported.sheets,
        rows = exported.rows,
        "report written"
    );
    Ok(exported)
}

/// `--out <path>` / `--out=<path>`, else `wrapped_<season>.xlsx`.
pub fn resolve_out_path(season: i32) -> PathBuf {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--out=") {
            if !path.trim().is_empty() {
                return PathBuf::from(path.trim());
            }
        }
        if arg == "--out"
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return PathBuf::from(next);
        }
    }
    PathBuf::from(format!("wrapped_{season}.xlsx"))
}
