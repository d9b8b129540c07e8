//! Server-wide HTTP error type
//!
//! Feature routes map their own error enums; `AppError` covers the top-level
//! routes, including the fallback for unknown paths.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::response::ErrorResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
        };

        ErrorResponse::new(code, message).into_response_with(status)
    }
}
