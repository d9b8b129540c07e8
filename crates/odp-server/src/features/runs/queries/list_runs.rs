//! List ingestion runs, most recent first

use serde::{Deserialize, Serialize};

use crate::features::FeatureState;
use crate::ingest::runs::{UnknownRunStatus, MAX_RUN_LIMIT};
use crate::ingest::{IngestionRun, RunError, RunFilter, RunStatus};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRunsQuery {
    /// Filter by source code (case-insensitive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Filter by status: running, succeeded or failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListRunsResponse {
    pub runs: Vec<IngestionRun>,
    pub total: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ListRunsError {
    #[error(transparent)]
    InvalidStatus(#[from] UnknownRunStatus),

    #[error("limit must be between 1 and {MAX_RUN_LIMIT}")]
    InvalidLimit,

    #[error(transparent)]
    Run(#[from] RunError),
}

impl ListRunsQuery {
    pub fn to_filter(&self) -> Result<RunFilter, ListRunsError> {
        if self.limit.is_some_and(|limit| !(1..=MAX_RUN_LIMIT).contains(&limit)) {
            return Err(ListRunsError::InvalidLimit);
        }
        let status = self
            .status
            .as_deref()
            .map(str::parse::<RunStatus>)
            .transpose()?;

        Ok(RunFilter {
            source_code: self
                .source
                .as_deref()
                .map(|code| code.trim().to_uppercase())
                .filter(|code| !code.is_empty()),
            status,
            limit: self.limit,
        })
    }
}

pub async fn handle(
    state: FeatureState,
    query: ListRunsQuery,
) -> Result<ListRunsResponse, ListRunsError> {
    let filter = query.to_filter()?;
    let runs = state.orchestrator.runs().list(&filter).await?;
    let total = runs.len();
    Ok(ListRunsResponse { runs, total })
}
