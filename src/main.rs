use std::path::PathBuf;

use clap::Parser;
use listings_etl::config::{validate_batch_size, CommitMode, Config};
use listings_etl::error::PipelineError;
use listings_etl::logging::init_tracing;
use listings_etl::services::ingest::{self, IngestReport};

#[derive(Parser, Debug)]
#[command(name = "listings-etl", version, about = "Load marketplace listings into PostgreSQL")]
struct Cli {
    /// Spreadsheet to load (overrides SOURCE_PATH)
    #[arg(long)]
    source: Option<PathBuf>,
    /// Rows per insert statement (overrides INGEST_BATCH_SIZE)
    #[arg(long)]
    batch_size: Option<usize>,
    /// `single` or `per-batch` (overrides INGEST_COMMIT_MODE)
    #[arg(long)]
    commit_mode: Option<CommitMode>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let result = match build_config(cli) {
        Ok(config) => ingest::run(&config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(report) => print_report(&report),
        Err(e) => {
            tracing::error!(error = %e, retryable = e.is_retryable(), "Ingest failed");
            eprintln!("Ingest failed: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn build_config(cli: Cli) -> Result<Config, PipelineError> {
    let mut config = Config::from_env()?;

    if let Some(source) = cli.source {
        config.ingest.source_path = source;
    }
    if let Some(size) = cli.batch_size {
        validate_batch_size(size)?;
        config.ingest.batch_size = size;
    }
    if let Some(mode) = cli.commit_mode {
        config.ingest.commit_mode = mode;
    }

    Ok(config)
}

fn print_report(report: &IngestReport) {
    println!("Ingest complete. Rows processed: {}", report.rows_read);
    println!("  Source: {}", report.source.display());
    println!("  Written: {}", report.upsert.rows_written);
    if report.upsert.duplicates_collapsed > 0 {
        println!(
            "  Duplicate identifiers collapsed: {}",
            report.upsert.duplicates_collapsed
        );
    }
    if report.coerced_values > 0 {
        println!("  Non-numeric values defaulted: {}", report.coerced_values);
    }

    if let Some(store) = &report.store {
        println!("\n Table totals:");
        println!("    Listings: {}", store.total_listings);
        println!("    Average price: {}", store.average_price);
        println!("    Average profit: {}", store.average_profit);
        println!("    Total profit: {}", store.total_profit);
    }
}
