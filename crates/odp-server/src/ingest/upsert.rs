//! Idempotent observation writes
//!
//! Writing the same draft twice leaves exactly one row whose fields match the
//! last write. Rows are addressed by `(country_id, indicator_id, year)`
//! within the partition the router picks for the year.

use chrono::Utc;
use std::sync::Arc;
use tracing::trace;

use crate::store::{ObservationStore, StoreError};

use super::partition::{route, NoPartitionForYear};
use super::types::{ObservationDraft, UpsertOutcome};

#[derive(Debug, thiserror::Error)]
pub enum UpsertError {
    #[error(transparent)]
    NoPartition(#[from] NoPartitionForYear),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct UpsertEngine {
    store: Arc<dyn ObservationStore>,
}

impl UpsertEngine {
    pub fn new(store: Arc<dyn ObservationStore>) -> Self {
        Self { store }
    }

    /// Insert the draft or overwrite the existing row for its key
    ///
    /// Routing happens before any write, so a year without a partition never
    /// reaches the store.
    pub async fn upsert(&self, draft: &ObservationDraft) -> Result<UpsertOutcome, UpsertError> {
        let partition = route(draft.year)?;
        let outcome = self
            .store
            .upsert_observation(partition, draft, Utc::now())
            .await?;
        trace!(
            partition = %partition,
            country_id = draft.country_id,
            indicator_id = draft.indicator_id,
            year = draft.year,
            ?outcome,
            "Observation written"
        );
        Ok(outcome)
    }
}
