//! Summary Handler
//!
//! GET /api/resumo (and its alias GET /api/analise/resumo) for table-wide or
//! filtered totals.

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::info;

use crate::handlers::response::{database_error, ApiError};
use crate::models::api::SummaryResponse;
use crate::services::listing_queries::ListingFilters;
use crate::services::store_summary;
use crate::AppState;

/// Listing count, average price, average and total profit
///
/// # Query Parameters
///
/// - `tipo_anuncio` - Exact listing type
/// - `produto_sku` - Exact product SKU
/// - `q` - Case-insensitive search in the title
/// - `integracao` - Exact integration name
///
/// # Response
///
/// ```json
/// {
///   "total_anuncios": 2,
///   "preco_medio": 75.0,
///   "lucro_medio": 17.5,
///   "lucro_total": 35.0
/// }
/// ```
pub async fn get_summary(
    State(state): State<AppState>,
    Query(filters): Query<ListingFilters>,
) -> Result<Json<SummaryResponse>, ApiError> {
    info!(?filters, "Summary request received");

    let summary = store_summary::fetch_filtered(state.db.as_ref(), &filters)
        .await
        .map_err(database_error("load summary"))?;

    Ok(Json(summary.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::response::testing::get;
    use axum::http::StatusCode;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn summary_row() -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("total_listings", Value::from(2i64)),
            ("average_price", Value::from(dec!(75.00))),
            ("average_profit", Value::from(dec!(17.50))),
            ("total_profit", Value::from(dec!(35.00))),
        ])
    }

    #[tokio::test]
    async fn test_summary_returns_numbers() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![summary_row()]]);

        let (status, body, log) = get(db, "/api/resumo?tipo_anuncio=Premium&q=motor").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({
                "total_anuncios": 2,
                "preco_medio": 75.0,
                "lucro_medio": 17.5,
                "lucro_total": 35.0
            })
        );
        let sql = &log[0].statements()[0].sql;
        assert!(sql.contains("WHERE tipo_anuncio = $1 AND titulo ILIKE '%' || $2 || '%'"));
    }

    #[tokio::test]
    async fn test_analysis_alias_is_unfiltered() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![summary_row()]]);

        let (status, _, log) = get(db, "/api/analise/resumo").await;

        assert_eq!(status, StatusCode::OK);
        assert!(!log[0].statements()[0].sql.contains("WHERE"));
    }

    #[tokio::test]
    async fn test_database_failure_is_500() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("relation \"anuncios\" does not exist".into())]);

        let (status, body, _) = get(db, "/api/resumo").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to load summary");
    }
}
