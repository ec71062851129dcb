//! End-to-end load: spreadsheet -> normalized listings -> `anuncios`
//!
//! Everything that can fail because of the input file happens before the database is
//! contacted, so a bad file never leaves a half-written table behind.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::services::database::connect_with_retry;
use crate::services::normalizer::{normalize, NormalizedListings};
use crate::services::source_reader::read_table;
use crate::services::store_summary::{self, StoreSummary};
use crate::services::upsert_writer::{
    validate_keys, validate_prices, ListingUpsertWriter, UpsertSummary, WriterOptions,
};

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows_read: usize,
    /// Numeric cells that were not numbers and got defaulted
    pub coerced_values: usize,
    pub upsert: UpsertSummary,
    /// Table totals after the load; `None` if the follow-up query failed
    pub store: Option<StoreSummary>,
}

/// Read and normalize the source without touching the database.
pub fn load_listings(path: &Path) -> Result<NormalizedListings, PipelineError> {
    let table = read_table(path)?;
    let listings = normalize(&table)?;
    validate_keys(&listings.rows)?;
    validate_prices(&listings.rows)?;

    info!(
        path = %path.display(),
        rows = listings.rows.len(),
        "Source loaded"
    );
    Ok(listings)
}

/// Upsert already-loaded listings through an open connection.
pub async fn ingest_listings(
    db: &DatabaseConnection,
    listings: &NormalizedListings,
    options: WriterOptions,
) -> Result<UpsertSummary, PipelineError> {
    let writer = ListingUpsertWriter::new(db, options)?;
    writer.upsert(&listings.rows).await
}

/// Full run as configured: load, wait for the database, upsert, summarize.
pub async fn run(config: &Config) -> Result<IngestReport, PipelineError> {
    let started_at = Utc::now();
    let source = config.ingest.source_path.clone();

    let listings = load_listings(&source)?;

    let db = connect_with_retry(&config.database, &config.connect_retry).await?;

    let upsert = ingest_listings(&db, &listings, WriterOptions::from(&config.ingest)).await?;

    let store = match store_summary::fetch(&db).await {
        Ok(summary) => Some(summary),
        Err(e) => {
            warn!(error = %e, "Could not compute table summary after load");
            None
        }
    };

    let report = IngestReport {
        source,
        started_at,
        finished_at: Utc::now(),
        rows_read: listings.rows.len(),
        coerced_values: listings.coercion.total_unparseable(),
        upsert,
        store,
    };

    info!(
        rows = report.rows_read,
        written = report.upsert.rows_written,
        duplicates = report.upsert.duplicates_collapsed,
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "Ingest complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::collections::HashMap;

    fn config_for(source: &Path) -> Config {
        let vars: HashMap<&str, String> = HashMap::from([
            ("SOURCE_PATH", source.display().to_string()),
            // Never reached: the run must fail before connecting
            ("DATABASE_URL", "nosuchdb://nowhere".to_string()),
            ("DB_CONNECT_ATTEMPTS", "1".to_string()),
        ]);
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_source_fails_before_connecting() {
        let config = config_for(Path::new("/no/such/dir/todos.xlsx"));

        let err = run(&config).await.unwrap_err();

        assert!(matches!(err, PipelineError::SourceNotFound { .. }));
        assert_eq!(err.exit_code(), crate::error::EXIT_FATAL);
    }

    #[tokio::test]
    async fn test_missing_column_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in ["Id", "Integração", "Identificador", "Título", "Produto (SKU)", "Preço de custo", "Tipo do anúncio"]
            .iter()
            .enumerate()
        {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        workbook.save(&path).unwrap();

        match run(&config_for(&path)).await {
            Err(PipelineError::Schema { missing }) => assert_eq!(missing, vec!["Preço"]),
            other => panic!("expected schema error, got {:?}", other.map(|r| r.rows_read)),
        }
    }

    #[tokio::test]
    async fn test_price_too_large_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in crate::services::normalizer::COLUMN_MAP.iter().enumerate() {
            sheet.write_string(0, col as u16, name.0).unwrap();
        }
        for (r, (identifier, price)) in [("MLB1", 19.9), ("MLB2", 12345678901.99)].iter().enumerate() {
            let r = (r + 1) as u32;
            sheet.write_string(r, 2, *identifier).unwrap();
            sheet.write_number(r, 5, 1.0).unwrap();
            sheet.write_number(r, 6, *price).unwrap();
        }
        workbook.save(&path).unwrap();

        let err = run(&config_for(&path)).await.unwrap_err();

        match &err {
            PipelineError::PriceOutOfRange { positions } => assert_eq!(positions, &vec![2]),
            other => panic!("expected price range error, got {:?}", other),
        }
        assert_eq!(err.exit_code(), crate::error::EXIT_FATAL);
    }
}
