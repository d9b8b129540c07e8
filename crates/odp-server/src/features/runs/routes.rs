//! Run history routes
//!
//! - `GET /api/v1/runs` - list runs (`source`, `status`, `limit`)
//! - `GET /api/v1/runs/stale` - runs still `running` past the threshold
//! - `GET /api/v1/runs/:id` - one run

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::api::response::{ApiResponse, ErrorResponse};
use crate::features::shared::store_failure;
use crate::features::FeatureState;
use crate::ingest::{RunError, RunId};

use super::queries::{
    get_run, list_runs, stale_runs, GetRunQuery, ListRunsError, ListRunsQuery, StaleRunsError,
    StaleRunsQuery,
};

pub fn runs_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", get(list))
        .route("/stale", get(stale))
        .route("/:id", get(get_one))
}

/// GET /runs?source=WB&status=failed&limit=20
#[tracing::instrument(skip(state))]
async fn list(
    State(state): State<FeatureState>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Response, RunsApiError> {
    let response = list_runs::handle(state, query).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

/// GET /runs/stale?threshold_secs=3600
#[tracing::instrument(skip(state))]
async fn stale(
    State(state): State<FeatureState>,
    Query(query): Query<StaleRunsQuery>,
) -> Result<Response, RunsApiError> {
    let response = stale_runs::handle(state, query).await?;
    if !response.runs.is_empty() {
        tracing::warn!(count = response.runs.len(), "Stale ingestion runs reported");
    }
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

/// GET /runs/:id
#[tracing::instrument(skip(state))]
async fn get_one(
    State(state): State<FeatureState>,
    Path(run_id): Path<RunId>,
) -> Result<Response, RunsApiError> {
    let run = get_run::handle(state, GetRunQuery { run_id }).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(run))).into_response())
}

#[derive(Debug)]
enum RunsApiError {
    List(ListRunsError),
    Stale(StaleRunsError),
    Run(RunError),
}

impl From<ListRunsError> for RunsApiError {
    fn from(err: ListRunsError) -> Self {
        Self::List(err)
    }
}

impl From<StaleRunsError> for RunsApiError {
    fn from(err: StaleRunsError) -> Self {
        Self::Stale(err)
    }
}

impl From<RunError> for RunsApiError {
    fn from(err: RunError) -> Self {
        Self::Run(err)
    }
}

fn run_failure(err: RunError) -> Response {
    match err {
        RunError::NotFound(id) => {
            ErrorResponse::new("NOT_FOUND", format!("Ingestion run {id} not found"))
                .into_response_with(StatusCode::NOT_FOUND)
        }
        RunError::Store(err) => store_failure(&err, "runs"),
        other => {
            tracing::error!(error = %other, "Run query failed");
            ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred")
                .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

impl IntoResponse for RunsApiError {
    fn into_response(self) -> Response {
        match self {
            RunsApiError::List(ListRunsError::InvalidStatus(err)) => {
                ErrorResponse::new("VALIDATION_ERROR", err.to_string())
                    .into_response_with(StatusCode::BAD_REQUEST)
            }
            RunsApiError::List(ListRunsError::InvalidLimit)
            | RunsApiError::Stale(StaleRunsError::InvalidThreshold) => {
                ErrorResponse::new("VALIDATION_ERROR", self.to_string())
                    .into_response_with(StatusCode::BAD_REQUEST)
            }
            RunsApiError::List(ListRunsError::Run(err))
            | RunsApiError::Stale(StaleRunsError::Run(err))
            | RunsApiError::Run(err) => run_failure(err),
        }
    }
}

impl std::fmt::Display for RunsApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::List(e) => write!(f, "{}", e),
            Self::Stale(e) => write!(f, "{}", e),
            Self::Run(e) => write!(f, "{}", e),
        }
    }
}
