//! Ingestion commands

pub mod run_batch;
pub mod run_ingestion;

pub use run_batch::{BatchItem, RunBatchCommand, RunBatchError};
pub use run_ingestion::{RunIngestionCommand, RunIngestionError};
