//! Read API router and server

use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::PipelineError;
use crate::handlers::{analysis, listings, summary};
use crate::services::database::connect_with_retry;
use crate::services::schema::ensure_schema;
use crate::AppState;

/// Build the API router; `cors_origin` restricts browsers to one origin.
pub fn router(state: AppState, cors_origin: Option<&str>) -> Result<Router, PipelineError> {
    let cors = match cors_origin {
        Some(origin) => {
            let origin = origin.parse::<HeaderValue>().map_err(|e| PipelineError::Config {
                message: format!("API_CORS_ORIGIN is not a valid origin: {}", e),
            })?;
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_credentials(true)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS]),
    };

    let api = Router::new()
        .route("/", get(root))
        .route("/resumo", get(summary::get_summary))
        .route("/anuncios", get(listings::get_listings))
        .route("/tipos", get(listings::get_listing_types))
        .route("/integracoes", get(listings::get_integrations))
        .route("/sku/analise", get(analysis::get_sku_analysis))
        .route("/analise/resumo", get(summary::get_summary))
        .route("/analise/integracoes", get(analysis::get_integration_counts))
        .route(
            "/analise/integracoes/{integracao}/tipos",
            get(analysis::get_types_in_integration),
        )
        .route(
            "/analise/integracoes/{integracao}/tipos/{tipo}/skus",
            get(analysis::get_sku_stats),
        )
        .route("/analise/skus/{sku}/anuncios", get(analysis::get_sku_listings));

    Ok(Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Listings API running" }))
}

/// Connect, make sure the table exists, then serve until the process stops.
pub async fn serve(config: &Config) -> Result<(), PipelineError> {
    let db = connect_with_retry(&config.database, &config.connect_retry).await?;
    ensure_schema(&db).await.map_err(|e| PipelineError::Serve {
        message: format!("schema guard failed: {}", e),
    })?;

    let app = router(
        AppState { db: Arc::new(db) },
        config.api.cors_origin.as_deref(),
    )?;

    let listener = tokio::net::TcpListener::bind(&config.api.bind_addr)
        .await
        .map_err(|e| PipelineError::Serve {
            message: format!("cannot bind {}: {}", config.api.bind_addr, e),
        })?;
    let addr = listener.local_addr().map_err(|e| PipelineError::Serve {
        message: e.to_string(),
    })?;
    info!(%addr, "Listings API listening");

    axum::serve(listener, app).await.map_err(|e| PipelineError::Serve {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::response::testing::get;
    use axum::http::StatusCode;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_root_and_unknown_paths() {
        let (status, body, _) = get(MockDatabase::new(DatabaseBackend::Postgres), "/api").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Listings API running");

        let (status, _, _) = get(MockDatabase::new(DatabaseBackend::Postgres), "/api/nada").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_cors_origin_is_a_config_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let state = AppState { db: Arc::new(db) };

        let err = router(state, Some("http://bad\norigin")).unwrap_err();

        assert!(matches!(err, PipelineError::Config { .. }));
    }
}
