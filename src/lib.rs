// src/lib.rs

use std::sync::Arc;

use sea_orm::DatabaseConnection;

/// Shared state of the read API handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
}

pub mod config;
pub mod error;
pub mod logging;

pub mod entities {
    pub mod anuncios;
}

pub mod models {
    pub mod api;
    pub mod listing;
    pub mod raw_table;
}

pub mod services {
    pub mod source_reader;
    pub mod normalizer;
    pub mod schema;
    pub mod upsert_writer;
    pub mod database;
    pub mod ingest;
    pub mod store_summary;
    pub mod listing_queries;
    pub mod merge;
    pub mod analysis;
    pub mod export;
}

pub mod handlers {
    pub mod response;
    pub mod summary;
    pub mod listings;
    pub mod analysis;
}

pub mod routes;
