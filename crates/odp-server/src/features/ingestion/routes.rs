//! Ingestion API routes
//!
//! - `POST /api/v1/ingest` - run one source over a year range
//! - `POST /api/v1/ingest/batch` - run several sources concurrently
//!
//! Both endpoints answer once the runs have finished. A run that started and
//! then failed still answers `200 OK`; its summary carries `status: failed`
//! and the error.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;

use crate::api::response::{ApiResponse, ErrorResponse};
use crate::features::shared::store_failure;
use crate::features::FeatureState;
use crate::ingest::IngestError;

use super::commands::{
    run_batch, run_ingestion, RunBatchCommand, RunBatchError, RunIngestionCommand,
    RunIngestionError,
};

pub fn ingestion_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", post(trigger_ingestion))
        .route("/batch", post(trigger_batch))
}

/// Run one ingestion task
///
/// # Request Body
///
/// ```json
/// { "source_code": "WB", "start_year": 2000, "end_year": 2010 }
/// ```
///
/// # Response
///
/// - `200 OK` - Run summary (succeeded or failed)
/// - `400 Bad Request` - Missing source or invalid year range
/// - `404 Not Found` - No collector registered for the source
/// - `503 Service Unavailable` - Store down or server shutting down
#[tracing::instrument(skip(state, command), fields(source = %command.source_code))]
async fn trigger_ingestion(
    State(state): State<FeatureState>,
    Json(command): Json<RunIngestionCommand>,
) -> Result<Response, IngestionApiError> {
    let summary = run_ingestion::handle(state, command).await?;

    tracing::info!(
        run_id = summary.run_id,
        status = %summary.status,
        processed = summary.records_processed,
        skipped = summary.records_skipped,
        "Ingestion finished via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(summary))).into_response())
}

/// Run several ingestion tasks; results keep the request order
#[tracing::instrument(skip(state, command))]
async fn trigger_batch(
    State(state): State<FeatureState>,
    Json(command): Json<RunBatchCommand>,
) -> Result<Response, IngestionApiError> {
    let items = run_batch::handle(state, command).await?;
    let failed = items.iter().filter(|item| item.error.is_some()).count();

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success_with_meta(
            &items,
            json!({ "total": items.len(), "rejected": failed }),
        )),
    )
        .into_response())
}

#[derive(Debug)]
enum IngestionApiError {
    Run(RunIngestionError),
    Batch(RunBatchError),
}

impl From<RunIngestionError> for IngestionApiError {
    fn from(err: RunIngestionError) -> Self {
        Self::Run(err)
    }
}

impl From<RunBatchError> for IngestionApiError {
    fn from(err: RunBatchError) -> Self {
        Self::Batch(err)
    }
}

fn ingest_failure(err: &IngestError) -> Response {
    match err {
        IngestError::UnknownSource(code) => {
            ErrorResponse::new("NOT_FOUND", format!("No collector registered for source '{code}'"))
                .into_response_with(StatusCode::NOT_FOUND)
        }
        IngestError::InvalidYearRange { .. } => {
            ErrorResponse::new("VALIDATION_ERROR", err.to_string())
                .into_response_with(StatusCode::BAD_REQUEST)
        }
        IngestError::Infrastructure(store_err) => store_failure(store_err, "ingest"),
        IngestError::Cancelled => ErrorResponse::new("UNAVAILABLE", "The server is shutting down")
            .into_response_with(StatusCode::SERVICE_UNAVAILABLE),
        other => {
            tracing::error!(kind = other.kind(), error = %other, "Ingestion could not start");
            ErrorResponse::with_details(
                "INTERNAL_ERROR",
                "Ingestion could not start",
                json!({ "kind": other.kind() }),
            )
            .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

impl IntoResponse for IngestionApiError {
    fn into_response(self) -> Response {
        match self {
            IngestionApiError::Run(RunIngestionError::SourceRequired)
            | IngestionApiError::Batch(RunBatchError::Size)
            | IngestionApiError::Batch(RunBatchError::SourceRequired { .. }) => {
                ErrorResponse::new("VALIDATION_ERROR", self.to_string())
                    .into_response_with(StatusCode::BAD_REQUEST)
            }
            IngestionApiError::Run(RunIngestionError::Ingest(err)) => ingest_failure(&err),
            IngestionApiError::Run(RunIngestionError::Task(message))
            | IngestionApiError::Batch(RunBatchError::Task(message)) => {
                tracing::error!(error = %message, "Ingestion task failed");
                ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl std::fmt::Display for IngestionApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run(e) => write!(f, "{}", e),
            Self::Batch(e) => write!(f, "{}", e),
        }
    }
}
