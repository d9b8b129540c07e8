//! Catalog routes
//!
//! - `GET /api/v1/catalog/sources`
//! - `GET /api/v1/catalog/categories`
//! - `GET /api/v1/catalog/countries?region=Europe`
//! - `GET /api/v1/catalog/indicators?source=WB&category=ECONOMY&page=1&per_page=20`
//! - `GET /api/v1/catalog/stats`

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
use crate::store::StoreError;

use super::queries::{
    get_stats, list_categories, list_countries, list_indicators, list_sources,
    ListCountriesQuery, ListIndicatorsError, ListIndicatorsQuery,
};

pub fn catalog_routes() -> Router<FeatureState> {
    Router::new()
        .route("/sources", get(sources))
        .route("/categories", get(categories))
        .route("/countries", get(countries))
        .route("/indicators", get(indicators))
        .route("/stats", get(stats))
}

async fn sources(State(state): State<FeatureState>) -> Result<Response, CatalogApiError> {
    let sources = list_sources::handle(state).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(sources))).into_response())
}

async fn categories(State(state): State<FeatureState>) -> Result<Response, CatalogApiError> {
    let categories = list_categories::handle(state).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(categories))).into_response())
}

async fn countries(
    State(state): State<FeatureState>,
    Query(query): Query<ListCountriesQuery>,
) -> Result<Response, CatalogApiError> {
    let countries = list_countries::handle(state, query).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(countries))).into_response())
}

#[tracing::instrument(skip(state))]
async fn indicators(
    State(state): State<FeatureState>,
    Query(query): Query<ListIndicatorsQuery>,
) -> Result<Response, CatalogApiError> {
    let page = list_indicators::handle(state, query).await?;
    let meta = json!({ "pagination": page.pagination });
    Ok((
        StatusCode::OK,
        Json(ApiResponse::success_with_meta(page.items, meta)),
    )
        .into_response())
}

async fn stats(State(state): State<FeatureState>) -> Result<Response, CatalogApiError> {
    let stats = get_stats::handle(state).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(stats))).into_response())
}

#[derive(Debug)]
enum CatalogApiError {
    Indicators(ListIndicatorsError),
    Store(StoreError),
}

impl From<ListIndicatorsError> for CatalogApiError {
    fn from(err: ListIndicatorsError) -> Self {
        Self::Indicators(err)
    }
}

impl From<StoreError> for CatalogApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for CatalogApiError {
    fn into_response(self) -> Response {
        match self {
            CatalogApiError::Indicators(ListIndicatorsError::InvalidPagination(message)) => {
                ErrorResponse::new("VALIDATION_ERROR", message)
                    .into_response_with(StatusCode::BAD_REQUEST)
            }
            CatalogApiError::Indicators(ListIndicatorsError::Store(err))
            | CatalogApiError::Store(err) => store_failure(&err, "catalog"),
        }
    }
}
