//! Error responses shared by the read handlers

use axum::{http::StatusCode, Json};
use sea_orm::DbErr;
use tracing::{error, warn};

use crate::models::api::ErrorResponse;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Log a failed query and answer 500 without leaking database details.
pub fn database_error(action: &'static str) -> impl FnOnce(DbErr) -> ApiError {
    move |e| {
        error!(error = %e, action, "Read query failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to {}", action),
            }),
        )
    }
}

pub fn bad_request(message: String) -> ApiError {
    warn!(error = %message, "Invalid query parameters");
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
}
