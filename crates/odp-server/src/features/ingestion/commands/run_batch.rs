//! Run several ingestion tasks concurrently

use serde::{Deserialize, Serialize};

use crate::features::FeatureState;
use crate::ingest::{IngestRequest, RunSummary};

use super::run_ingestion::RunIngestionCommand;

/// Upper bound on requests accepted in one batch
pub const MAX_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunBatchCommand {
    pub requests: Vec<RunIngestionCommand>,
}

/// Result for one request of the batch, in request order
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub request: IngestRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchItemError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemError {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RunBatchError {
    #[error("batch must contain between 1 and {MAX_BATCH_SIZE} requests")]
    Size,

    #[error("request {index}: source_code is required")]
    SourceRequired { index: usize },

    #[error("ingestion batch ended unexpectedly: {0}")]
    Task(String),
}

impl RunBatchCommand {
    pub fn validate(&self) -> Result<(), RunBatchError> {
        if self.requests.is_empty() || self.requests.len() > MAX_BATCH_SIZE {
            return Err(RunBatchError::Size);
        }
        if let Some(index) = self
            .requests
            .iter()
            .position(|r| r.source_code.trim().is_empty())
        {
            return Err(RunBatchError::SourceRequired { index });
        }
        Ok(())
    }
}

#[tracing::instrument(skip(state, command), fields(requests = command.requests.len()))]
pub async fn handle(
    state: FeatureState,
    command: RunBatchCommand,
) -> Result<Vec<BatchItem>, RunBatchError> {
    command.validate()?;

    let requests: Vec<IngestRequest> = command.requests.iter().map(|c| c.to_request()).collect();
    let orchestrator = state.orchestrator.clone();
    let cancel = state.shutdown.child_token();
    let batch = requests.clone();
    let results = tokio::spawn(async move { orchestrator.ingest_many(batch, cancel).await })
        .await
        .map_err(|err| RunBatchError::Task(err.to_string()))?;

    Ok(requests
        .into_iter()
        .zip(results)
        .map(|(request, result)| match result {
            Ok(summary) => BatchItem {
                request,
                summary: Some(summary),
                error: None,
            },
            Err(err) => BatchItem {
                request,
                summary: None,
                error: Some(BatchItemError {
                    kind: err.kind(),
                    message: err.to_string(),
                }),
            },
        })
        .collect())
}
