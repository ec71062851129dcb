//! Analysis Handlers
//!
//! Drill-down from integrations to listing types, SKUs and finally the listings of
//! one SKU, plus the SKU repetition report.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use crate::handlers::response::{bad_request, database_error, ApiError};
use crate::models::api::{Page, PageQuery, SkuAnalysisQuery, SkuAnalysisResponse, SkuAnalysisStats};
use crate::services::listing_queries::{
    self, IntegrationCount, SkuListing, SkuStats, TypeCount,
};
use crate::AppState;

/// GET /api/analise/integracoes
pub async fn get_integration_counts(
    State(state): State<AppState>,
) -> Result<Json<Vec<IntegrationCount>>, ApiError> {
    let counts = listing_queries::count_by_integration(state.db.as_ref())
        .await
        .map_err(database_error("load integrations"))?;
    Ok(Json(counts))
}

/// GET /api/analise/integracoes/{integracao}/tipos
pub async fn get_types_in_integration(
    State(state): State<AppState>,
    Path(integration): Path<String>,
) -> Result<Json<Vec<TypeCount>>, ApiError> {
    let counts = listing_queries::count_types_in_integration(state.db.as_ref(), &integration)
        .await
        .map_err(database_error("load listing types"))?;
    Ok(Json(counts))
}

/// GET /api/analise/integracoes/{integracao}/tipos/{tipo}/skus
///
/// SKUs of one integration and listing type with average price and profit,
/// most listed first.
pub async fn get_sku_stats(
    State(state): State<AppState>,
    Path((integration, listing_type)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<SkuStats>>, ApiError> {
    let paging = query.paging();
    let (rows, total) =
        listing_queries::sku_stats(state.db.as_ref(), &integration, &listing_type, paging)
            .await
            .map_err(database_error("load SKUs"))?;

    Ok(Json(Page::new(rows, paging, total)))
}

/// GET /api/analise/skus/{sku}/anuncios
pub async fn get_sku_listings(
    State(state): State<AppState>,
    Path(sku): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<SkuListing>>, ApiError> {
    let paging = query.paging();
    let (rows, total) = listing_queries::listings_for_sku(state.db.as_ref(), &sku, paging)
        .await
        .map_err(database_error("load listings"))?;

    Ok(Json(Page::new(rows, paging, total)))
}

/// SKUs with the ids and titles of their listings
///
/// GET /api/sku/analise
///
/// # Query Parameters
///
/// - `q` - Case-insensitive search in the SKU
/// - `duplicados` - `true` to keep only SKUs used by more than one listing
/// - `min`, `max` - Bounds on listings per SKU
/// - `page`, `limit` - Pagination (default: 1 and 10)
pub async fn get_sku_analysis(
    State(state): State<AppState>,
    Query(query): Query<SkuAnalysisQuery>,
) -> Result<Json<SkuAnalysisResponse>, ApiError> {
    query.validate().map_err(bad_request)?;

    let paging = query.paging();
    let page = listing_queries::sku_groups(state.db.as_ref(), &query.filter(), paging)
        .await
        .map_err(database_error("analyse SKUs"))?;

    info!(
        skus = page.total_skus,
        duplicated = page.total_duplicated,
        returned = page.groups.len(),
        "SKU analysis returned"
    );

    Ok(Json(SkuAnalysisResponse {
        stats: SkuAnalysisStats {
            total_skus: page.total_skus,
            total_duplicados: page.total_duplicated,
            total_pages: paging.total_pages(page.total_skus),
        },
        data: page.groups,
    }))
}
