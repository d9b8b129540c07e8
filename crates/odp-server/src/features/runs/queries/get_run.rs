//! Fetch one ingestion run by id

use serde::{Deserialize, Serialize};

use crate::features::FeatureState;
use crate::ingest::{IngestionRun, RunError, RunId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRunQuery {
    pub run_id: RunId,
}

pub async fn handle(state: FeatureState, query: GetRunQuery) -> Result<IngestionRun, RunError> {
    state.orchestrator.runs().get(query.run_id).await
}
