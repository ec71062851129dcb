// src/bin/listings_api.rs

use clap::Parser;
use listings_etl::config::Config;
use listings_etl::logging::init_tracing;
use listings_etl::routes;

#[derive(Parser, Debug)]
#[command(name = "listings_api", version, about = "Read-only HTTP API over the loaded listings")]
struct Cli {
    /// Address to listen on (overrides API_BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(e.exit_code());
        }
    };
    if let Some(bind) = cli.bind {
        config.api.bind_addr = bind;
    }

    if let Err(e) = routes::serve(&config).await {
        tracing::error!(error = %e, "API server stopped");
        eprintln!("API server failed: {}", e);
        std::process::exit(e.exit_code());
    }
}
