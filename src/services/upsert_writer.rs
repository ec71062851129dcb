//! Batched, idempotent upsert of listings into `anuncios`
//!
//! Every batch is a single `INSERT ... ON CONFLICT (identificador) DO UPDATE`, so
//! re-running a load with the same file converges to the same table state.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    sqlx, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Insert, RuntimeErr, Set,
    TransactionTrait,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{validate_batch_size, CommitMode, IngestConfig, DEFAULT_BATCH_SIZE};
use crate::entities::anuncios;
use crate::error::PipelineError;
use crate::models::listing::ListingRow;
use crate::services::normalizer::PRICE_LIMIT;
use crate::services::schema::ensure_schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    pub batch_size: usize,
    pub commit_mode: CommitMode,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            commit_mode: CommitMode::SingleTransaction,
        }
    }
}

impl From<&IngestConfig> for WriterOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            commit_mode: config.commit_mode,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    /// Rows handed to the writer
    pub rows_received: usize,
    /// Distinct identifiers sent to the database
    pub rows_written: usize,
    /// Earlier rows replaced by a later row with the same identifier
    pub duplicates_collapsed: usize,
    pub batches: usize,
    pub committed_rows: usize,
}

pub struct ListingUpsertWriter<'a> {
    db: &'a DatabaseConnection,
    options: WriterOptions,
}

impl<'a> ListingUpsertWriter<'a> {
    pub fn new(db: &'a DatabaseConnection, options: WriterOptions) -> Result<Self, PipelineError> {
        validate_batch_size(options.batch_size)?;
        Ok(Self { db, options })
    }

    /// Upsert `rows`, returning what was written.
    ///
    /// Rows are validated before anything touches the database. In
    /// `CommitMode::SingleTransaction` nothing is committed unless every batch
    /// succeeds; in `CommitMode::PerBatch` a failure reports how many rows were
    /// already committed.
    pub async fn upsert(&self, rows: &[ListingRow]) -> Result<UpsertSummary, PipelineError> {
        validate_keys(rows)?;
        validate_prices(rows)?;

        let (models, duplicates_collapsed) = collapse_duplicates(rows);
        if duplicates_collapsed > 0 {
            warn!(
                duplicates = duplicates_collapsed,
                "Repeated identifiers in source, keeping the last occurrence"
            );
        }

        let batches: Vec<Vec<anuncios::ActiveModel>> = models
            .chunks(self.options.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let total_batches = batches.len();

        info!(
            rows = models.len(),
            batches = total_batches,
            batch_size = self.options.batch_size,
            mode = ?self.options.commit_mode,
            "Starting upsert"
        );

        let committed_rows = match self.options.commit_mode {
            CommitMode::SingleTransaction => self.write_in_one_transaction(batches).await?,
            CommitMode::PerBatch => self.write_per_batch(batches).await?,
        };

        Ok(UpsertSummary {
            rows_received: rows.len(),
            rows_written: models.len(),
            duplicates_collapsed,
            batches: total_batches,
            committed_rows,
        })
    }

    async fn write_in_one_transaction(
        &self,
        batches: Vec<Vec<anuncios::ActiveModel>>,
    ) -> Result<usize, PipelineError> {
        let total_batches = batches.len();
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| classify_db_error(e, 0, 0))?;

        ensure_schema(&txn)
            .await
            .map_err(|e| classify_db_error(e, 0, 0))?;

        let mut written = 0;
        for (idx, batch) in batches.into_iter().enumerate() {
            let len = batch.len();
            write_batch(&txn, batch)
                .await
                .map_err(|e| classify_db_error(e, idx + 1, 0))?;
            written += len;
            debug!(batch = idx + 1, total_batches, rows = written, "Batch written");
        }

        // Dropping the transaction on any error above rolls everything back
        txn.commit()
            .await
            .map_err(|e| classify_db_error(e, total_batches, 0))?;

        Ok(written)
    }

    async fn write_per_batch(
        &self,
        batches: Vec<Vec<anuncios::ActiveModel>>,
    ) -> Result<usize, PipelineError> {
        let total_batches = batches.len();
        ensure_schema(self.db)
            .await
            .map_err(|e| classify_db_error(e, 0, 0))?;

        let mut committed = 0;
        for (idx, batch) in batches.into_iter().enumerate() {
            let batch_no = idx + 1;
            let len = batch.len();

            let txn = self
                .db
                .begin()
                .await
                .map_err(|e| classify_db_error(e, batch_no, committed))?;
            write_batch(&txn, batch)
                .await
                .map_err(|e| classify_db_error(e, batch_no, committed))?;
            txn.commit()
                .await
                .map_err(|e| classify_db_error(e, batch_no, committed))?;

            committed += len;
            info!(
                "Progress: batch {}/{} committed ({} rows)",
                batch_no, total_batches, committed
            );
        }

        Ok(committed)
    }
}

async fn write_batch<C>(conn: &C, batch: Vec<anuncios::ActiveModel>) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    if batch.is_empty() {
        return Ok(0);
    }
    upsert_statement(batch).exec_without_returning(conn).await
}

/// `INSERT ... ON CONFLICT (identificador) DO UPDATE` for one batch.
///
/// `created_at` is neither inserted (the column default applies) nor updated.
pub fn upsert_statement(batch: Vec<anuncios::ActiveModel>) -> Insert<anuncios::ActiveModel> {
    anuncios::Entity::insert_many(batch).on_conflict(
        OnConflict::column(anuncios::Column::Identificador)
            .update_columns([
                anuncios::Column::Id,
                anuncios::Column::Integracao,
                anuncios::Column::Titulo,
                anuncios::Column::ProdutoSku,
                anuncios::Column::PrecoCusto,
                anuncios::Column::Preco,
                anuncios::Column::TipoAnuncio,
            ])
            .to_owned(),
    )
}

/// Every row needs a non-blank identifier to be upserted.
pub fn validate_keys(rows: &[ListingRow]) -> Result<(), PipelineError> {
    let positions: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.key().is_none())
        .map(|(idx, _)| idx + 1)
        .collect();

    if positions.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::InvalidRows { positions })
    }
}

/// Both prices must fit `NUMERIC(12, 2)`, i.e. stay strictly below `PRICE_LIMIT`
/// in absolute value.
pub fn validate_prices(rows: &[ListingRow]) -> Result<(), PipelineError> {
    let limit = Decimal::from(PRICE_LIMIT);
    let positions: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.price.abs() >= limit || row.cost_price.abs() >= limit)
        .map(|(idx, _)| idx + 1)
        .collect();

    if positions.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::PriceOutOfRange { positions })
    }
}

/// Collapse rows sharing an identifier; the last one seen wins.
///
/// Callers must run `validate_keys` first, rows without a key are skipped here.
pub fn collapse_duplicates(rows: &[ListingRow]) -> (Vec<anuncios::ActiveModel>, usize) {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(rows.len());
    let mut models: Vec<anuncios::ActiveModel> = Vec::with_capacity(rows.len());
    let mut duplicates = 0;

    for row in rows {
        let Some(key) = row.key() else { continue };
        let model = to_active_model(row, key);

        match positions.get(key) {
            Some(&pos) => {
                models[pos] = model;
                duplicates += 1;
            }
            None => {
                positions.insert(key, models.len());
                models.push(model);
            }
        }
    }

    (models, duplicates)
}

fn to_active_model(row: &ListingRow, key: &str) -> anuncios::ActiveModel {
    anuncios::ActiveModel {
        id: Set(row.id),
        integracao: Set(row.integration.clone()),
        identificador: Set(key.to_string()),
        titulo: Set(row.title.clone()),
        produto_sku: Set(row.product_sku.clone()),
        preco_custo: Set(Some(row.cost_price)),
        preco: Set(Some(row.price)),
        tipo_anuncio: Set(row.listing_type.clone()),
        ..Default::default()
    }
}

/// Lost connections are retryable connectivity failures. Data exceptions and
/// integrity violations (SQLSTATE classes 22 and 23) reject `batch` for good;
/// anything else is a failed write of `batch`.
pub fn classify_db_error(err: DbErr, batch: usize, committed_rows: usize) -> PipelineError {
    if matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_)) {
        return PipelineError::Connectivity {
            attempts: 1,
            message: err.to_string(),
        };
    }

    let rejected = sqlstate(&err).is_some_and(|code| code.starts_with("22") || code.starts_with("23"));
    if rejected {
        PipelineError::Rejected {
            batch,
            committed_rows,
            message: err.to_string(),
        }
    } else {
        PipelineError::Write {
            batch,
            committed_rows,
            message: err.to_string(),
        }
    }
}

fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(e))) => {
            e.code().map(|code| code.into_owned())
        }
        _ => None,
    }
}
