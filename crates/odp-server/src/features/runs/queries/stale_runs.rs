//! Report runs left in `running` past the liveness threshold
//!
//! Stale runs are never resumed or closed automatically. The report exists so
//! an operator can reconcile them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::features::FeatureState;
use crate::ingest::{RunError, StaleRun};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaleRunsQuery {
    /// Overrides the configured threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaleRunsResponse {
    pub threshold_secs: u64,
    pub runs: Vec<StaleRun>,
}

#[derive(Debug, thiserror::Error)]
pub enum StaleRunsError {
    #[error("threshold_secs must be greater than 0")]
    InvalidThreshold,

    #[error(transparent)]
    Run(#[from] RunError),
}

pub async fn handle(
    state: FeatureState,
    query: StaleRunsQuery,
) -> Result<StaleRunsResponse, StaleRunsError> {
    let threshold = match query.threshold_secs {
        Some(0) => return Err(StaleRunsError::InvalidThreshold),
        Some(secs) => Duration::from_secs(secs),
        None => state.stale_run_threshold,
    };

    let runs = state.orchestrator.runs().stale_runs(threshold).await?;
    Ok(StaleRunsResponse {
        threshold_secs: threshold.as_secs(),
        runs,
    })
}
