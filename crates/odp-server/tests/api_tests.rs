//! HTTP API tests
//!
//! The full router (middleware included) is driven with `tower::ServiceExt::oneshot`
//! on top of the in-memory store.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::{fast_settings, orchestrator, seeded_store, wb};
use odp_server::api::create_router;
use odp_server::config::CorsConfig;
use odp_server::features::FeatureState;
use odp_server::ingest::{Collector, RawRecord, StaticCollector};
use odp_server::store::{MemoryStore, ReadStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn records() -> Vec<RawRecord> {
    vec![
        RawRecord::new("USA", "NY.GDP.PCAP.CD", 2019, 65000.0),
        RawRecord::new("USA", "NY.GDP.PCAP.CD", 2020, 63500.0),
        RawRecord::new("US", "NY.GDP.PCAP.CD", "2021", "..").with_note("not yet published"),
        RawRecord::new("DEU", "NY.GDP.PCAP.CD", 2020, 46000.0),
        RawRecord::new("ZZZ", "NY.GDP.PCAP.CD", 2020, 1.0),
    ]
}

async fn create_test_app() -> (Router, Arc<MemoryStore>) {
    let store = seeded_store().await;
    let orch = orchestrator(
        &store,
        vec![Arc::new(StaticCollector::new(wb(), records())) as Arc<dyn Collector>],
        fast_settings(),
    );
    let read: Arc<dyn ReadStore> = store.clone();
    let state = FeatureState {
        orchestrator: orch,
        read,
        stale_run_threshold: Duration::from_secs(3600),
        shutdown: CancellationToken::new(),
    };
    let cors = CorsConfig {
        allowed_origins: vec!["http://localhost:3000".to_string()],
        allow_credentials: false,
    };
    (create_router(state, &cors), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get_request(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_request(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn ingest_wb(app: &Router) -> Value {
    let (status, body) = post_request(
        app,
        "/api/v1/ingest",
        json!({ "source_code": "wb", "start_year": 2000, "end_year": 2025 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn test_root_and_health() {
    let (app, store) = create_test_app().await;

    let (status, body) = get_request(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["collectors"], json!(["WB"]));

    let (status, body) = get_request(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    store.set_unavailable(true);
    let (status, body) = get_request(&app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_ingest_returns_run_summary() {
    let (app, _) = create_test_app().await;

    let body = ingest_wb(&app).await;
    assert_eq!(body["success"], true);
    let summary = &body["data"];
    assert_eq!(summary["source_code"], "WB");
    assert_eq!(summary["status"], "succeeded");
    assert_eq!(summary["records_processed"], 4);
    assert_eq!(summary["records_skipped"], 1);
    assert_eq!(summary["skips_by_reason"]["unknown_country"], 1);
    assert!(summary["duration_ms"].is_u64());
}

#[tokio::test]
async fn test_ingest_rejects_bad_requests() {
    let (app, _) = create_test_app().await;

    let (status, body) = post_request(
        &app,
        "/api/v1/ingest",
        json!({ "source_code": "NOPE", "start_year": 2000, "end_year": 2010 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = post_request(
        &app,
        "/api/v1/ingest",
        json!({ "source_code": "WB", "start_year": 2010, "end_year": 2000 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = post_request(
        &app,
        "/api/v1/ingest",
        json!({ "source_code": " ", "start_year": 2000, "end_year": 2010 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_ingest_reports_each_request() {
    let (app, _) = create_test_app().await;

    let (status, body) = post_request(
        &app,
        "/api/v1/ingest/batch",
        json!({ "requests": [
            { "source_code": "WB", "start_year": 2000, "end_year": 2025 },
            { "source_code": "IMF", "start_year": 2000, "end_year": 2025 }
        ]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 2);
    assert_eq!(body["meta"]["rejected"], 1);
    assert_eq!(body["data"][0]["summary"]["status"], "succeeded");
    assert_eq!(body["data"][1]["error"]["kind"], "unknown_source");
}

#[tokio::test]
async fn test_observation_point_and_range_queries() {
    let (app, _) = create_test_app().await;
    ingest_wb(&app).await;

    let (status, body) =
        get_request(&app, "/api/v1/observations?country=usa&indicator=NY.GDP.PCAP.CD&year=2020").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"]["observations"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["value"], 63500.0);
    assert_eq!(rows[0]["source_code"], "WB");

    let (status, body) = get_request(
        &app,
        "/api/v1/observations?country=USA&indicator=NY.GDP.PCAP.CD&start_year=2019&end_year=2021",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 3);
    let rows = body["data"]["observations"].as_array().unwrap();
    let years: Vec<_> = rows.iter().map(|row| row["year"].as_i64().unwrap()).collect();
    assert_eq!(years, vec![2019, 2020, 2021]);
    assert!(rows[2]["value"].is_null());
    assert_eq!(rows[2]["source_note"], "not yet published");

    let (status, body) = get_request(&app, "/api/v1/observations?indicator=NY.GDP.PCAP.CD").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_run_history_endpoints() {
    let (app, _) = create_test_app().await;
    let summary = ingest_wb(&app).await;
    let run_id = summary["data"]["run_id"].as_i64().unwrap();

    let (status, body) = get_request(&app, "/api/v1/runs?source=wb").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["runs"][0]["status"], "succeeded");

    let (status, body) = get_request(&app, &format!("/api/v1/runs/{run_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["records_processed"], 4);

    let (status, _) = get_request(&app, "/api/v1/runs/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_request(&app, "/api/v1/runs?status=paused").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get_request(&app, "/api/v1/runs/stale").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["threshold_secs"], 3600);
    assert_eq!(body["data"]["runs"], json!([]));

    let (status, _) = get_request(&app, "/api/v1/runs/stale?threshold_secs=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_catalog_browsing() {
    let (app, _) = create_test_app().await;
    ingest_wb(&app).await;

    let (status, body) = get_request(&app, "/api/v1/catalog/sources").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 8);

    let (status, body) = get_request(&app, "/api/v1/catalog/categories").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 12);

    let (status, body) = get_request(&app, "/api/v1/catalog/countries?region=europe").await;
    assert_eq!(status, StatusCode::OK);
    let countries = body["data"].as_array().unwrap();
    assert!(!countries.is_empty());
    assert!(countries.iter().all(|c| c["region"] == "EUROPE"));

    let (status, body) = get_request(&app, "/api/v1/catalog/indicators?source=WB&page=1&per_page=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["code"], "NY.GDP.PCAP.CD");
    assert_eq!(body["meta"]["pagination"]["total"], 1);

    let (status, _) = get_request(&app, "/api/v1/catalog/indicators?per_page=500").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get_request(&app, "/api/v1/catalog/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["countries"], 42);
    assert_eq!(body["data"]["observations"], 4);
    assert_eq!(body["data"]["runs"], 1);
}

#[tokio::test]
async fn test_store_outage_maps_to_service_unavailable() {
    let (app, store) = create_test_app().await;
    store.set_unavailable(true);

    let (status, body) = get_request(&app, "/api/v1/catalog/sources").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "UNAVAILABLE");

    let (status, _) = post_request(
        &app,
        "/api/v1/ingest",
        json!({ "source_code": "WB", "start_year": 2000, "end_year": 2010 }),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = create_test_app().await;

    let (status, body) = get_request(&app, "/api/v1/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
