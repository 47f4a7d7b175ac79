use anyhow::{Result, anyhow};

use tm_wrapped::app;
use tm_wrapped::config::WrappedConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Collect,
    Generate,
    All,
}

fn main() -> Result<()> {
    app::init();
    let mode = parse_mode()?;
    let config = WrappedConfig::from_env()?;
    let db_path = app::resolve_db_path(&config)?;

    if matches!(mode, Mode::Collect | Mode::All) {
        let summary = app::run_collect(&config, &db_path)?;
        println!("Collection complete");
        println!("DB: {}", db_path.display());
        println!("Season: {}", summary.season);
        println!("Months: {}", summary.months_fetched);
        println!("Maps: {}/{}", summary.maps_upserted, summary.maps_discovered);
        println!("Runs upserted: {}", summary.runs_upserted);
    }
    if matches!(mode, Mode::Generate | Mode::All) {
        let out = app::resolve_out_path(config.season);
        let report = app::run_generate(&config, &db_path, &out)?;
        println!("Report: {} ({} sheets, {} rows)", out.display(), report.sheets, report.rows);
    }
    Ok(())
}

fn parse_mode() -> Result<Mode> {
    let Some(first) = std::env::args().nth(1).filter(|a| !a.starts_with("--")) else {
        return Ok(Mode::All);
    };
    match first.as_str() {
        "collect" => Ok(Mode::Collect),
        "generate" => Ok(Mode::Generate),
        "all" => Ok(Mode::All),
        other => Err(anyhow!("unknown mode {other:?} (expected collect, generate or all)")),
    }
}
