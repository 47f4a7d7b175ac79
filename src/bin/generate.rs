use anyhow::Result;

use tm_wrapped::app;
use tm_wrapped::config::WrappedConfig;

fn main() -> Result<()> {
    app::init();
    let config = WrappedConfig::from_env()?;
    let db_path = app::resolve_db_path(&config)?;
    let out = app::resolve_out_path(config.season);

    let report = app::run_generate(&config, &db_path, &out)?;
    println!("Report written");
    println!("DB: {}", db_path.display());
    println!("Out: {}", out.display());
    println!("Sheets: {}", report.sheets);
    println!("Rows: {}", report.rows);
    Ok(())
}
