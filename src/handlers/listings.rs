//! Listing Handlers
//!
//! GET /api/anuncios for the paginated listing table, plus the distinct values
//! that feed its filter dropdowns.

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::info;

use crate::entities::anuncios;
use crate::handlers::response::{database_error, ApiError};
use crate::models::api::{ListingPageQuery, Page};
use crate::services::listing_queries::{self, SortColumn, SortOrder};
use crate::AppState;

/// Paginated, filtered and sorted listings
///
/// GET /api/anuncios
///
/// # Query Parameters
///
/// - `tipo_anuncio`, `produto_sku`, `integracao` - Exact matches
/// - `q` - Case-insensitive search in the title
/// - `page` - 1-based page (default: 1)
/// - `limit` - Page size (default: 10, clamped to 1..=100)
/// - `ordenarPor` - `id`, `preco`, `titulo` or `data_criacao` (default: `id`)
/// - `ordem` - `ASC` or `DESC` (default: `ASC`)
pub async fn get_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingPageQuery>,
) -> Result<Json<Page<anuncios::Model>>, ApiError> {
    let paging = query.paging();
    let sort = SortColumn::parse(query.order_by.as_deref());
    let order = SortOrder::parse(query.order.as_deref());

    let (rows, total) =
        listing_queries::find_listings(state.db.as_ref(), &query.filters(), sort, order, paging)
            .await
            .map_err(database_error("load listings"))?;

    info!(
        count = rows.len(),
        total,
        page = paging.page,
        limit = paging.limit,
        "Listings returned"
    );

    Ok(Json(Page::new(rows, paging, total)))
}

/// GET /api/tipos
pub async fn get_listing_types(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let types = listing_queries::listing_types(state.db.as_ref())
        .await
        .map_err(database_error("load listing types"))?;
    Ok(Json(types))
}

/// GET /api/integracoes
pub async fn get_integrations(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let integrations = listing_queries::integrations(state.db.as_ref())
        .await
        .map_err(database_error("load integrations"))?;
    Ok(Json(integrations))
}
