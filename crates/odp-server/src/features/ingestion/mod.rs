pub mod commands;
pub mod routes;

pub use commands::{RunBatchCommand, RunIngestionCommand};
pub use routes::ingestion_routes;
