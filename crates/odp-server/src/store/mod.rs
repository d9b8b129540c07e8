//! Storage seams
//!
//! The pipeline talks to persistence only through the traits in this module.
//! [`PgStore`] implements them on PostgreSQL; [`MemoryStore`] implements the
//! same constraint semantics in process for tests and dry runs.
//!
//! Catalog inserts return `Ok(None)` when a uniqueness constraint rejected the
//! row. Callers treat that as "someone else created it first" and re-read.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{
    Category, CategoryId, Country, Indicator, IndicatorId, NewCategory, NewCountry, NewIndicator,
    Source, SourceDescriptor, SourceId,
};
use crate::ingest::partition::Partition;
use crate::ingest::runs::{IngestionRun, RunFilter, RunFinalization, RunId};
use crate::ingest::types::{ObservationDraft, UpsertOutcome};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_country(&self, iso3: &str) -> StoreResult<Option<Country>>;

    /// Returns `false` when the country already existed
    async fn insert_country(&self, country: &NewCountry) -> StoreResult<bool>;

    async fn find_source(&self, code: &str) -> StoreResult<Option<Source>>;

    async fn insert_source(&self, source: &SourceDescriptor) -> StoreResult<Option<SourceId>>;

    async fn touch_source(&self, source_id: SourceId, at: DateTime<Utc>) -> StoreResult<()>;

    async fn find_category(&self, code: &str) -> StoreResult<Option<Category>>;

    async fn insert_category(&self, category: &NewCategory) -> StoreResult<Option<CategoryId>>;

    async fn find_indicator(&self, source_id: SourceId, code: &str) -> StoreResult<Option<Indicator>>;

    async fn insert_indicator(&self, indicator: &NewIndicator) -> StoreResult<Option<IndicatorId>>;
}

#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Insert or overwrite the row for the draft's key inside `partition`
    async fn upsert_observation(
        &self,
        partition: Partition,
        draft: &ObservationDraft,
        fetched_at: DateTime<Utc>,
    ) -> StoreResult<UpsertOutcome>;
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn insert_run(&self, source_id: SourceId, started_at: DateTime<Utc>) -> StoreResult<RunId>;

    /// Apply the finalization only if the run is still `running`
    ///
    /// Returns `false` when no running row matched.
    async fn finalize_run(&self, run_id: RunId, finalization: &RunFinalization) -> StoreResult<bool>;

    async fn get_run(&self, run_id: RunId) -> StoreResult<Option<IngestionRun>>;

    async fn list_runs(&self, filter: &RunFilter) -> StoreResult<Vec<IngestionRun>>;

    async fn running_runs_started_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<IngestionRun>>;
}

/// A lock that is currently held by this process
#[async_trait]
pub trait HeldLock: Send {
    async fn release(self: Box<Self>) -> StoreResult<()>;
}

/// Exclusive hold on a source, released explicitly or on drop
pub struct SourceLock {
    source_code: String,
    held: Option<Box<dyn HeldLock>>,
}

impl SourceLock {
    pub fn new(source_code: &str, held: Box<dyn HeldLock>) -> Self {
        Self {
            source_code: source_code.to_string(),
            held: Some(held),
        }
    }

    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    pub async fn release(mut self) -> StoreResult<()> {
        match self.held.take() {
            Some(held) => held.release().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for SourceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceLock")
            .field("source_code", &self.source_code)
            .field("held", &self.held.is_some())
            .finish()
    }
}

/// Serializes ingestion tasks for the same source
#[async_trait]
pub trait SourceLocks: Send + Sync {
    /// Wait until no other task holds `source_code`, then take it
    async fn lock_source(&self, source_code: &str) -> StoreResult<SourceLock>;
}

/// Point or range query over observations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationQuery {
    /// ISO3 country code
    pub country: String,
    /// External indicator code
    pub indicator: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub start_year: Option<i32>,
    #[serde(default)]
    pub end_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ObservationView {
    pub country_iso3: String,
    pub source_code: String,
    pub indicator_code: String,
    pub year: i32,
    pub value: Option<f64>,
    pub is_estimated: bool,
    pub source_note: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorFilter {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct IndicatorView {
    pub id: IndicatorId,
    pub source_code: String,
    pub category_code: Option<String>,
    pub code: String,
    pub name: String,
    pub unit: Option<String>,
    pub frequency: String,
}

/// Row counts used by status reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub countries: i64,
    pub sources: i64,
    pub categories: i64,
    pub indicators: i64,
    pub observations: i64,
    pub runs: i64,
}

/// Read-only access backing the query surface
#[async_trait]
pub trait ReadStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    /// Observations ordered by source then year
    async fn query_observations(&self, query: &ObservationQuery) -> StoreResult<Vec<ObservationView>>;

    async fn list_countries(&self, region: Option<&str>) -> StoreResult<Vec<Country>>;

    async fn list_sources(&self) -> StoreResult<Vec<Source>>;

    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    /// One page of indicators plus the total matching count
    async fn list_indicators(&self, filter: &IndicatorFilter) -> StoreResult<(Vec<IndicatorView>, i64)>;

    async fn catalog_stats(&self) -> StoreResult<CatalogStats>;
}
