// src/bin/listings_report.rs

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dialoguer::{Input, Select};
use listings_etl::config::Config;
use listings_etl::error::PipelineError;
use listings_etl::logging::init_tracing;
use listings_etl::models::listing::ListingRow;
use listings_etl::services::analysis::{distinct_listing_types, summarize, ListingFilter, ListingSummary};
use listings_etl::services::export::save_filtered;
use listings_etl::services::normalizer::normalize;
use listings_etl::services::source_reader::read_table;
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(name = "listings_report", version, about = "Summaries and filtered exports of listings")]
struct Cli {
    /// Spreadsheet to analyse (defaults to the consolidated file)
    #[arg(long, global = true)]
    source: Option<PathBuf>,
    /// Folder for filtered exports (defaults to OUTPUT_DIR)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Totals and averages over all listings
    Summary {
        /// Print as JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List the distinct listing types
    Types,
    /// Export the listings matching one criterion
    Filter {
        /// Exact listing type
        #[arg(long, conflicts_with_all = ["sku", "titulo"])]
        tipo: Option<String>,
        /// Exact product SKU
        #[arg(long, conflicts_with = "titulo")]
        sku: Option<String>,
        /// Word contained in the title, case-insensitive
        #[arg(long)]
        titulo: Option<String>,
    },
    /// Interactive menu (default)
    Menu,
}

const MENU_ITEMS: [&str; 5] = [
    "Overall summary",
    "Filter by listing type",
    "Filter by SKU",
    "Filter by word in title",
    "Quit",
];

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "Report failed");
        eprintln!("❌ {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    let config = Config::from_env()?;
    let source = cli.source.unwrap_or_else(|| config.workspace.merged_path());
    let output_dir = cli.output_dir.unwrap_or(config.workspace.output_dir);

    let rows = load_rows(&source)?;

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Summary { json } => {
            let summary = summarize(&rows);
            if json {
                let body = serde_json::to_string_pretty(&summary).map_err(|e| PipelineError::Render {
                    message: e.to_string(),
                })?;
                println!("{}", body);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Types => {
            for kind in distinct_listing_types(&rows) {
                println!("{}", kind);
            }
        }
        Commands::Filter { tipo, sku, titulo } => {
            let filter = match (tipo, sku, titulo) {
                (Some(v), _, _) => ListingFilter::ListingType(v.trim().to_string()),
                (_, Some(v), _) => ListingFilter::Sku(v.trim().to_string()),
                (_, _, Some(v)) => ListingFilter::TitleContains(v.trim().to_string()),
                (None, None, None) => {
                    return Err(PipelineError::Config {
                        message: "filter needs one of --tipo, --sku or --titulo".to_string(),
                    });
                }
            };
            export(&rows, &filter, &output_dir)?;
        }
        Commands::Menu => menu(&rows, &output_dir)?,
    }

    Ok(())
}

/// Rows for reporting; blank identifiers are tolerated here, unlike in the loader.
fn load_rows(source: &Path) -> Result<Vec<ListingRow>, PipelineError> {
    let table = read_table(source)?;
    Ok(normalize(&table)?.rows)
}

fn print_summary(summary: &ListingSummary) {
    let money = |v: Option<Decimal>| match v {
        Some(d) => format!("R$ {:.2}", d.round_dp(2)),
        None => "-".to_string(),
    };

    println!("\n📊 OVERALL SUMMARY");
    println!("Listings: {}", summary.count);
    println!("Average price: {}", money(summary.mean_price));
    println!("Average profit: {}", money(summary.mean_profit));
    println!("Total profit: {}", money(summary.total_profit));
}

fn export(rows: &[ListingRow], filter: &ListingFilter, dir: &Path) -> Result<(), PipelineError> {
    match save_filtered(rows, filter, dir)? {
        Some(path) => println!("✅ File saved: {}", path.display()),
        None => println!("⚠ No matching listings."),
    }
    Ok(())
}

fn console_error(e: dialoguer::Error) -> PipelineError {
    PipelineError::Console {
        message: e.to_string(),
    }
}

fn menu(rows: &[ListingRow], output_dir: &Path) -> Result<(), PipelineError> {
    let ask = |prompt: &str| -> Result<String, PipelineError> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map(|s| s.trim().to_string())
            .map_err(console_error)
    };

    loop {
        let choice = Select::new()
            .with_prompt("=== ANALYSIS MENU ===")
            .items(&MENU_ITEMS[..])
            .default(0)
            .interact()
            .map_err(console_error)?;

        match choice {
            0 => print_summary(&summarize(rows)),
            1 => {
                println!("\nAvailable types: {}", distinct_listing_types(rows).join(", "));
                let tipo = ask("Listing type")?;
                export(rows, &ListingFilter::ListingType(tipo), output_dir)?;
            }
            2 => {
                let sku = ask("SKU")?;
                export(rows, &ListingFilter::Sku(sku), output_dir)?;
            }
            3 => {
                let word = ask("Word to search in the title")?;
                export(rows, &ListingFilter::TitleContains(word), output_dir)?;
            }
            _ => {
                println!("👋 Bye.");
                return Ok(());
            }
        }
    }
}
