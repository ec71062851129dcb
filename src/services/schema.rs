//! Idempotent schema guard for the `anuncios` table
//!
//! Runs `CREATE TABLE IF NOT EXISTS` on every ingest. This is not a
//! migration: an existing table is left exactly as it is.

use sea_orm::sea_query::{ColumnDef, Keyword, SimpleExpr, Table, TableCreateStatement};
use sea_orm::{ConnectionTrait, DbErr, DeriveIden};
use tracing::debug;

#[derive(DeriveIden)]
pub enum Anuncios {
    Table,
    Id,
    Integracao,
    Identificador,
    Titulo,
    ProdutoSku,
    PrecoCusto,
    Preco,
    TipoAnuncio,
    CreatedAt,
}

pub fn create_table_statement() -> TableCreateStatement {
    Table::create()
        .table(Anuncios::Table)
        .if_not_exists()
        .col(ColumnDef::new(Anuncios::Id).big_integer())
        .col(ColumnDef::new(Anuncios::Integracao).text())
        .col(ColumnDef::new(Anuncios::Identificador).text().unique_key())
        .col(ColumnDef::new(Anuncios::Titulo).text())
        .col(ColumnDef::new(Anuncios::ProdutoSku).text())
        .col(ColumnDef::new(Anuncios::PrecoCusto).decimal_len(12, 2))
        .col(ColumnDef::new(Anuncios::Preco).decimal_len(12, 2))
        .col(ColumnDef::new(Anuncios::TipoAnuncio).text())
        .col(
            ColumnDef::new(Anuncios::CreatedAt)
                .timestamp()
                .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
        )
        .to_owned()
}

/// Make sure the destination table exists. Safe to call on every run.
pub async fn ensure_schema<C>(conn: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    conn.execute(backend.build(&create_table_statement())).await?;
    debug!("Schema guard executed for anuncios");
    Ok(())
}
