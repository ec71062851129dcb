// src/bin/merge_spreadsheets.rs

use std::path::PathBuf;

use clap::Parser;
use listings_etl::config::Config;
use listings_etl::logging::init_tracing;
use listings_etl::services::merge::merge_workspace;

#[derive(Parser, Debug)]
#[command(
    name = "merge_spreadsheets",
    version,
    about = "Consolidate marketplace exports into a single spreadsheet"
)]
struct Cli {
    /// Folder with the exports (overrides INPUT_DIR)
    #[arg(long)]
    input_dir: Option<PathBuf>,
    /// Folder for the consolidated file (overrides OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Consolidated file name (overrides MERGED_FILE_NAME)
    #[arg(long)]
    output_name: Option<String>,
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let mut workspace = config.workspace;
    if let Some(dir) = cli.input_dir {
        workspace.input_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        workspace.output_dir = dir;
    }
    if let Some(name) = cli.output_name {
        workspace.merged_file_name = name;
    }

    println!(" Merging spreadsheets from {}...", workspace.input_dir.display());

    let summary = match merge_workspace(&workspace) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "Merge failed");
            eprintln!("Merge failed: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    for outcome in &summary.outcomes {
        match &outcome.result {
            Ok(rows) => println!("    {}: {} rows", outcome.path.display(), rows),
            Err(reason) => println!("    {}: skipped ({})", outcome.path.display(), reason),
        }
    }

    match &summary.output {
        Some(path) => {
            println!("\n Merge complete!");
            println!("    Files merged: {}", summary.succeeded());
            println!("    Rows: {}", summary.total_rows);
            println!("    Output: {}", path.display());
        }
        None => {
            println!(
                "\n Nothing to merge. Place .xls/.xlsx exports in {}",
                workspace.input_dir.display()
            );
        }
    }
}
