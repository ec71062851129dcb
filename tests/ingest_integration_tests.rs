mod common;

use std::collections::HashMap;

use listings_etl::config::{CommitMode, Config};
use listings_etl::services::ingest::{self, ingest_listings, load_listings};
use listings_etl::services::upsert_writer::WriterOptions;
use rust_decimal_macros::dec;

use crate::common::{cleanup_listings, fetch_listings, setup_test_db, write_source};

/// Load the same file twice: same row count, same content
#[tokio::test]
async fn test_rerun_is_idempotent() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let prefix = "it-idem-";
    cleanup_listings(&db, prefix).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.xlsx");
    write_source(
        &path,
        &[
            ("it-idem-1", "Pastilha de freio", dec!(60.00), dec!(100.00)),
            ("it-idem-2", "Filtro de óleo", dec!(12.346), dec!(19.9)),
        ],
    );

    let listings = load_listings(&path).unwrap();
    let first = ingest_listings(&db, &listings, WriterOptions::default()).await.unwrap();
    let after_first = fetch_listings(&db, prefix).await.unwrap();

    let second = ingest_listings(&db, &listings, WriterOptions::default()).await.unwrap();
    let mut after_second = fetch_listings(&db, prefix).await.unwrap();

    assert_eq!(first.rows_written, 2);
    assert_eq!(second.rows_written, 2);
    assert_eq!(after_second.len(), 2);

    let mut after_first = after_first;
    after_first.sort_by(|a, b| a.identificador.cmp(&b.identificador));
    after_second.sort_by(|a, b| a.identificador.cmp(&b.identificador));
    assert_eq!(after_first, after_second);

    // Prices are stored with two decimals
    assert_eq!(after_second[1].preco_custo, Some(dec!(12.35)));
    assert_eq!(after_second[1].preco, Some(dec!(19.90)));

    cleanup_listings(&db, prefix).await.unwrap();
}

/// A changed price updates the existing row and keeps its creation time
#[tokio::test]
async fn test_price_change_updates_in_place() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let prefix = "it-upd-";
    cleanup_listings(&db, prefix).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.xlsx");

    write_source(&path, &[("it-upd-1", "Amortecedor", dec!(150.00), dec!(220.00))]);
    let listings = load_listings(&path).unwrap();
    ingest_listings(&db, &listings, WriterOptions::default()).await.unwrap();
    let before = fetch_listings(&db, prefix).await.unwrap();

    write_source(&path, &[("it-upd-1", "Amortecedor dianteiro", dec!(150.00), dec!(199.90))]);
    let listings = load_listings(&path).unwrap();
    ingest_listings(&db, &listings, WriterOptions::default()).await.unwrap();
    let after = fetch_listings(&db, prefix).await.unwrap();

    assert_eq!(before.len(), 1);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].preco, Some(dec!(199.90)));
    assert_eq!(after[0].titulo.as_deref(), Some("Amortecedor dianteiro"));
    assert!(before[0].created_at.is_some());
    assert_eq!(after[0].created_at, before[0].created_at);

    cleanup_listings(&db, prefix).await.unwrap();
}

/// Repeated identifiers in one file end up as a single row holding the last values
#[tokio::test]
async fn test_duplicate_identifiers_keep_last_per_batch_mode() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let prefix = "it-dup-";
    cleanup_listings(&db, prefix).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.xlsx");
    write_source(
        &path,
        &[
            ("it-dup-1", "Primeira", dec!(1.00), dec!(2.00)),
            ("it-dup-2", "Outro", dec!(1.00), dec!(2.00)),
            ("it-dup-1", "Segunda", dec!(3.00), dec!(4.00)),
        ],
    );

    let listings = load_listings(&path).unwrap();
    let options = WriterOptions {
        batch_size: 1,
        commit_mode: CommitMode::PerBatch,
    };
    let summary = ingest_listings(&db, &listings, options).await.unwrap();

    assert_eq!(summary.rows_received, 3);
    assert_eq!(summary.duplicates_collapsed, 1);
    assert_eq!(summary.committed_rows, 2);

    let rows = fetch_listings(&db, prefix).await.unwrap();
    assert_eq!(rows.len(), 2);
    let dup = rows.iter().find(|r| r.identificador == "it-dup-1").unwrap();
    assert_eq!(dup.titulo.as_deref(), Some("Segunda"));
    assert_eq!(dup.preco, Some(dec!(4.00)));

    cleanup_listings(&db, prefix).await.unwrap();
}

/// Full configured run against the test database
#[tokio::test]
async fn test_run_reports_store_summary() {
    let Some(db) = setup_test_db().await else {
        return;
    };
    let prefix = "it-run-";
    cleanup_listings(&db, prefix).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.xlsx");
    write_source(&path, &[("it-run-1", "Correia dentada", dec!(40.00), dec!(89.90))]);

    let vars: HashMap<&str, String> = HashMap::from([
        ("SOURCE_PATH", path.display().to_string()),
        ("DATABASE_URL", std::env::var("TEST_DATABASE_URL").unwrap()),
        ("DB_CONNECT_ATTEMPTS", "3".to_string()),
        ("DB_CONNECT_DELAY_SECS", "1".to_string()),
    ]);
    let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let report = ingest::run(&config).await.unwrap();

    assert_eq!(report.rows_read, 1);
    assert_eq!(report.upsert.rows_written, 1);
    assert!(report.finished_at >= report.started_at);
    let store = report.store.expect("summary should be computed");
    assert!(store.total_listings >= 1);

    cleanup_listings(&db, prefix).await.unwrap();
}
