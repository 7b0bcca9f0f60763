use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use care_etl::config::Config;
use care_etl::store::LoadMode;
use care_etl::{logging, run};

#[derive(Parser)]
#[command(name = "care_etl")]
#[command(about = "Healthcare service records ETL: ingest, clean, enrich, analyze, persist")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full refresh: ingest, clean, enrich, analyze, persist, report
    Run {
        /// Load mode override (append, truncate, merge)
        #[arg(long, value_enum)]
        mode: Option<LoadMode>,
    },
    /// Rebuild the report support-table artifact from persisted data
    Report,
    /// Rebuild only the rankings artifacts from persisted data
    Rankings,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run { mode } => {
            if let Some(mode) = mode {
                config.persistence.load_mode = mode;
            }
            match run::run_full_refresh(&config) {
                Ok(summary) => {
                    let audit = &summary.audit;
                    println!("\n📊 Run results:");
                    println!("   Files read: {}", audit.files_read);
                    println!("   Rows imported: {}", audit.rows_imported);
                    println!("   Rows after filter: {}", audit.rows_after_filter);
                    println!("   Invalid dates dropped: {}", audit.invalid_dates_dropped);
                    println!("   Negative quantities fixed: {}", audit.negative_quantity_fixed);
                    println!("   Negative prices fixed: {}", audit.negative_price_fixed);
                    println!("   Duplicates removed: {}", audit.duplicates_removed);
                    println!("   P90 revenue: {}", audit.p90_revenue);
                    println!("   Rows persisted: {}", audit.rows_persisted);
                }
                Err(e) => {
                    error!("Full refresh failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Report => run::rebuild_support_artifact(&config)?,
        Commands::Rankings => run::rebuild_rankings_artifact(&config)?,
    }
    Ok(())
}
