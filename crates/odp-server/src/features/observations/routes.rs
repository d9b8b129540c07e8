//! Observation query routes
//!
//! - `GET /api/v1/observations?country=USA&indicator=NY.GDP.MKTP.CD&year=2020`
//! - `GET /api/v1/observations?country=USA&indicator=NY.GDP.MKTP.CD&start_year=2000&end_year=2010&source=WB`
//!
//! Results are ordered by source, then year. A missing value is returned as
//! `null`, distinct from an absent row.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::api::response::{ApiResponse, ErrorResponse};
use crate::features::shared::store_failure;
use crate::features::FeatureState;

use super::queries::{get_observations, GetObservationsError, GetObservationsQuery};

pub fn observations_routes() -> Router<FeatureState> {
    Router::new().route("/", get(query_observations))
}

async fn query_observations(
    State(state): State<FeatureState>,
    Query(query): Query<GetObservationsQuery>,
) -> Result<Response, ObservationsApiError> {
    let response = get_observations::handle(state, query).await?;
    let count = response.observations.len();

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success_with_meta(response, json!({ "count": count }))),
    )
        .into_response())
}

#[derive(Debug)]
struct ObservationsApiError(GetObservationsError);

impl From<GetObservationsError> for ObservationsApiError {
    fn from(err: GetObservationsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ObservationsApiError {
    fn into_response(self) -> Response {
        match self.0 {
            GetObservationsError::Store(err) => store_failure(&err, "query_observations"),
            other => ErrorResponse::new("VALIDATION_ERROR", other.to_string())
                .into_response_with(StatusCode::BAD_REQUEST),
        }
    }
}
