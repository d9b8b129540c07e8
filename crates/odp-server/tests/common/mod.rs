//! Shared fixtures for the odp-server integration tests
//!
//! - seeded [`MemoryStore`] and orchestrator builders
//! - scripted collectors (gated, flaky, stalling) for retry, timeout and
//!   concurrency tests
//! - a PostgreSQL testcontainer with migrations applied

#![allow(dead_code)]

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use odp_server::catalog::bootstrap::seed_reference_data;
use odp_server::catalog::{reference, SourceDescriptor};
use odp_server::ingest::{
    Collector, CollectorError, CollectorRegistry, IngestSettings, ObservationKey, Orchestrator,
    RawRecord, RecordStream,
};
use odp_server::store::{CatalogStore, MemoryStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::Semaphore;

pub fn wb() -> SourceDescriptor {
    reference::source_descriptor("WB")
}

pub fn imf() -> SourceDescriptor {
    reference::source_descriptor("IMF")
}

pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    seed_reference_data(store.as_ref())
        .await
        .expect("seeding an empty memory store");
    store
}

/// Settings with short delays so real-time tests stay fast
pub fn fast_settings() -> IngestSettings {
    IngestSettings {
        max_fetch_attempts: 3,
        backoff_base: Duration::from_millis(10),
        backoff_max: Duration::from_millis(40),
        fetch_timeout: Duration::from_secs(5),
    }
}

pub fn orchestrator(
    store: &Arc<MemoryStore>,
    collectors: Vec<Arc<dyn Collector>>,
    settings: IngestSettings,
) -> Arc<Orchestrator> {
    let registry = collectors
        .into_iter()
        .fold(CollectorRegistry::new(), |registry, collector| registry.with(collector));
    Arc::new(Orchestrator::new(store.clone(), registry, settings))
}

/// Look up the observation key for external codes
pub async fn key_for(
    store: &MemoryStore,
    source: &str,
    iso3: &str,
    indicator: &str,
    year: i32,
) -> ObservationKey {
    let country = store.find_country(iso3).await.unwrap().expect("country exists");
    let source = store.find_source(source).await.unwrap().expect("source exists");
    let indicator = store
        .find_indicator(source.id, indicator)
        .await
        .unwrap()
        .expect("indicator exists");
    ObservationKey {
        country_id: country.id,
        indicator_id: indicator.id,
        year,
    }
}

/// Emits its records, then blocks until a permit is added to the gate
///
/// Every fetch consumes one permit before the stream ends.
pub struct GatedCollector {
    descriptor: SourceDescriptor,
    records: Vec<RawRecord>,
    gate: Arc<Semaphore>,
}

impl GatedCollector {
    pub fn new(descriptor: SourceDescriptor, records: Vec<RawRecord>) -> Self {
        Self {
            descriptor,
            records,
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn gate(&self) -> Arc<Semaphore> {
        self.gate.clone()
    }
}

impl Collector for GatedCollector {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    fn fetch(&self, _start_year: i32, _end_year: i32) -> RecordStream {
        let gate = self.gate.clone();
        let records = stream::iter(self.records.clone().into_iter().map(Ok));
        let wait = stream::once(async move {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        })
        .filter_map(|_| async { None::<Result<RawRecord, CollectorError>> });
        records.chain(wait).boxed()
    }
}

/// Fails the first `failures` fetches with a transient error after emitting
/// the first record, then emits every record
pub struct FlakyCollector {
    descriptor: SourceDescriptor,
    records: Vec<RawRecord>,
    failures: u32,
    fetches: AtomicU32,
}

impl FlakyCollector {
    pub fn new(descriptor: SourceDescriptor, records: Vec<RawRecord>, failures: u32) -> Self {
        Self {
            descriptor,
            records,
            failures,
            fetches: AtomicU32::new(0),
        }
    }

    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Collector for FlakyCollector {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    fn fetch(&self, _start_year: i32, _end_year: i32) -> RecordStream {
        let fetch = self.fetches.fetch_add(1, Ordering::SeqCst);
        if fetch < self.failures {
            let first = self.records.first().cloned().map(Ok);
            let items: Vec<_> = first
                .into_iter()
                .chain(std::iter::once(Err(CollectorError::Transient(format!(
                    "connection reset (fetch {})",
                    fetch + 1
                )))))
                .collect();
            return stream::iter(items).boxed();
        }
        stream::iter(self.records.clone().into_iter().map(Ok)).boxed()
    }
}

/// Emits its records and then never yields again
pub struct StallingCollector {
    descriptor: SourceDescriptor,
    records: Vec<RawRecord>,
}

impl StallingCollector {
    pub fn new(descriptor: SourceDescriptor, records: Vec<RawRecord>) -> Self {
        Self { descriptor, records }
    }
}

impl Collector for StallingCollector {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    fn fetch(&self, _start_year: i32, _end_year: i32) -> RecordStream {
        stream::iter(self.records.clone().into_iter().map(Ok))
            .chain(stream::pending::<Result<RawRecord, CollectorError>>())
            .boxed()
    }
}

/// PostgreSQL container with the workspace migrations applied
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        let container = Postgres::default()
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&format!("postgresql://postgres:postgres@{}:{}/postgres", host, port))
            .await
            .context("Failed to connect to PostgreSQL")?;

        odp_server::db::run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
