//! Aggregate figures computed by the database over the loaded listings

use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DbErr, FromQueryResult, Statement};
use serde::Serialize;

use crate::services::listing_queries::ListingFilters;

#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct StoreSummary {
    pub total_listings: i64,
    pub average_price: Decimal,
    pub average_profit: Decimal,
    pub total_profit: Decimal,
}

const SUMMARY_SQL: &str = r#"
    SELECT
        COUNT(*)::bigint                                      AS total_listings,
        ROUND(COALESCE(AVG(preco), 0), 2)                     AS average_price,
        ROUND(COALESCE(AVG(preco - preco_custo), 0), 2)       AS average_profit,
        COALESCE(SUM(preco - preco_custo), 0)::numeric(14, 2) AS total_profit
    FROM anuncios"#;

/// Totals over the whole table
pub async fn fetch<C>(conn: &C) -> Result<StoreSummary, DbErr>
where
    C: ConnectionTrait,
{
    fetch_filtered(conn, &ListingFilters::default()).await
}

/// Totals over the rows matching `filters`; no match gives zeros.
pub async fn fetch_filtered<C>(conn: &C, filters: &ListingFilters) -> Result<StoreSummary, DbErr>
where
    C: ConnectionTrait,
{
    let backend = conn.get_database_backend();
    let (where_sql, values) = filters.where_clause();
    let sql = format!("{}{}", SUMMARY_SQL, where_sql);

    StoreSummary::find_by_statement(Statement::from_sql_and_values(backend, sql, values))
        .one(conn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound("anuncios summary".to_string()))
}
