use anyhow::Result;

use tm_wrapped::app;
use tm_wrapped::config::WrappedConfig;
use tm_wrapped::error::ingest_error;

fn main() -> Result<()> {
    app::init();
    let config = WrappedConfig::from_env()?;
    let db_path = app::resolve_db_path(&config)?;

    let summary = match app::run_collect(&config, &db_path) {
        Ok(summary) => summary,
        Err(err) => {
            if ingest_error(&err).is_some_and(|e| e.is_auth_failure()) {
                eprintln!("Authentication failed; the store was not modified.");
            }
            return Err(err);
        }
    };

    println!("Collection complete");
    println!("DB: {}", db_path.display());
    println!("Season: {}", summary.season);
    println!("Months fetched: {} (gap days: {})", summary.months_fetched, summary.gap_days);
    println!(
        "Maps: {}/{} in {} batches",
        summary.maps_upserted, summary.maps_discovered, summary.map_batches
    );
    println!("Leaderboards: {}", summary.leaderboards_fetched);
    println!("Runs upserted: {}", summary.runs_upserted);
    Ok(())
}
