//! Feature slices of the HTTP API
//!
//! Each feature is a vertical slice:
//! - `commands/` - operations that write (ingestion)
//! - `queries/` - read operations
//! - `routes.rs` - axum handlers and the feature's error-to-response mapping
//!
//! Handlers call the command/query `handle` functions directly.

pub mod catalog;
pub mod ingestion;
pub mod observations;
pub mod runs;
pub mod shared;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::ingest::Orchestrator;
use crate::store::ReadStore;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Runs ingestion tasks; also owns the run tracker
    pub orchestrator: Arc<Orchestrator>,
    /// Read side of the store backing the query endpoints
    pub read: Arc<dyn ReadStore>,
    /// Age after which a `running` run is reported as stale
    pub stale_run_threshold: Duration,
    /// Cancelled on server shutdown; ingestion tasks get child tokens
    pub shutdown: CancellationToken,
}

/// Mount every feature under its path prefix
///
/// - `/ingest` - trigger ingestion runs
/// - `/runs` - run history and stale-run report
/// - `/observations` - observation point and range queries
/// - `/catalog` - countries, sources, categories, indicators
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest("/ingest", ingestion::ingestion_routes().with_state(state.clone()))
        .nest("/runs", runs::runs_routes().with_state(state.clone()))
        .nest("/observations", observations::observations_routes().with_state(state.clone()))
        .nest("/catalog", catalog::catalog_routes().with_state(state))
}
