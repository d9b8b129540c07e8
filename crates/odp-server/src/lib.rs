//! ODP Server Library
//!
//! Ingestion, normalization and storage of socioeconomic time series
//! collected from external statistical providers.
//!
//! # Architecture
//!
//! - [`catalog`]: countries, sources, categories and indicators, plus the
//!   resolver that maps provider codes to catalog ids
//! - [`ingest`]: the pipeline (collector, normalizer, partition router,
//!   upsert engine, run tracker) and the orchestrator driving it
//! - [`store`]: persistence seams with PostgreSQL and in-memory backends
//! - [`features`]: HTTP feature slices (ingestion, runs, observations, catalog)
//! - [`api`]: router assembly and the serve loop
//!
//! # Example
//!
//! ```no_run
//! use odp_server::{config::Config, db, store::PgStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     db::run_migrations(&pool).await?;
//!     let _store = PgStore::new(pool);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;
pub mod store;

pub use error::AppError;
