//! Ingestion pipeline
//!
//! Collector → [`normalize`] → catalog resolver → [`UpsertEngine`], with each
//! task bracketed by the [`RunTracker`] and driven by the [`Orchestrator`].

pub mod collector;
pub mod normalize;
pub mod orchestrator;
pub mod partition;
pub mod runs;
pub mod types;
pub mod upsert;

pub use collector::{
    Collector, CollectorError, CollectorRegistry, JsonLinesCollector, RecordStream,
    StaticCollector,
};
pub use normalize::normalize;
pub use orchestrator::{IngestError, IngestSettings, Orchestrator};
pub use partition::{route, NoPartitionForYear, Partition};
pub use runs::{IngestionRun, RunError, RunFilter, RunId, RunStatus, RunTracker, StaleRun};
pub use types::{
    IngestRequest, NormalizedRecord, ObservationDraft, ObservationKey, RawRecord, RecordFlags,
    RunSummary, SkipReason, SkipTally, UpsertOutcome,
};
pub use upsert::{UpsertEngine, UpsertError};
