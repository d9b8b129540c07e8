//! Run one ingestion task

use serde::{Deserialize, Serialize};

use crate::features::FeatureState;
use crate::ingest::{IngestError, IngestRequest, RunSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIngestionCommand {
    /// Provider code, e.g. `WB`
    pub source_code: String,
    pub start_year: i32,
    pub end_year: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum RunIngestionError {
    #[error("source_code is required")]
    SourceRequired,

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("ingestion task ended unexpectedly: {0}")]
    Task(String),
}

impl RunIngestionCommand {
    pub fn validate(&self) -> Result<(), RunIngestionError> {
        if self.source_code.trim().is_empty() {
            return Err(RunIngestionError::SourceRequired);
        }
        Ok(())
    }

    pub fn to_request(&self) -> IngestRequest {
        IngestRequest::new(&self.source_code, self.start_year, self.end_year)
    }
}

/// Run the task to completion and return its summary
///
/// The task is spawned so that a client disconnect cannot drop it halfway
/// through a run; only server shutdown cancels it.
#[tracing::instrument(skip(state, command), fields(source = %command.source_code))]
pub async fn handle(
    state: FeatureState,
    command: RunIngestionCommand,
) -> Result<RunSummary, RunIngestionError> {
    command.validate()?;

    let request = command.to_request();
    let orchestrator = state.orchestrator.clone();
    let cancel = state.shutdown.child_token();
    let task = tokio::spawn(async move { orchestrator.ingest(request, cancel).await });

    let summary = task
        .await
        .map_err(|err| RunIngestionError::Task(err.to_string()))??;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_source_is_rejected() {
        let command = RunIngestionCommand {
            source_code: "  ".to_string(),
            start_year: 2000,
            end_year: 2001,
        };
        assert!(matches!(command.validate(), Err(RunIngestionError::SourceRequired)));
    }

    #[test]
    fn test_request_is_normalized() {
        let command = RunIngestionCommand {
            source_code: " wb ".to_string(),
            start_year: 2000,
            end_year: 2001,
        };
        assert_eq!(command.to_request().source_code, "WB");
    }
}
