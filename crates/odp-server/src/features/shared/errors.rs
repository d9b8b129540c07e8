//! Store error to HTTP response mapping shared by the feature routes

use axum::{http::StatusCode, response::Response};

use crate::api::response::ErrorResponse;
use crate::store::StoreError;

/// Log a store failure and answer 503 (unreachable) or 500 (anything else)
pub fn store_failure(err: &StoreError, operation: &str) -> Response {
    match err {
        StoreError::Unavailable(message) => {
            tracing::error!(operation, error = %message, "Store unavailable");
            ErrorResponse::new("UNAVAILABLE", "The data store is unavailable")
                .into_response_with(StatusCode::SERVICE_UNAVAILABLE)
        }
        other => {
            tracing::error!(operation, error = %other, "Store error");
            ErrorResponse::new("INTERNAL_ERROR", "A database error occurred")
                .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
