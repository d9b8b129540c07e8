//! Ingestion run tracking
//!
//! Every orchestrated task owns exactly one row in `ingestion_logs`: created by
//! [`RunTracker::begin`] and finalized exactly once by [`RunTracker::complete`]
//! or [`RunTracker::fail`]. A second terminal call is rejected. Runs left in
//! `running` after a crash are reported by [`RunTracker::stale_runs`] for an
//! operator to reconcile; they are never resumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::SourceId;
use crate::store::{RunStore, StoreError};

use super::types::SkipTally;

pub type RunId = i64;

/// Lifecycle state of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown run status: {0}")]
pub struct UnknownRunStatus(pub String);

impl FromStr for RunStatus {
    type Err = UnknownRunStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            other => Err(UnknownRunStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for RunStatus {
    type Error = UnknownRunStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One row of `ingestion_logs`, joined with its source code
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct IngestionRun {
    pub id: RunId,
    pub source_id: SourceId,
    pub source_code: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[sqlx(try_from = "String")]
    pub status: RunStatus,
    pub records_processed: i64,
    pub error_message: Option<String>,
}

/// Terminal state written by a single finalization
#[derive(Debug, Clone, PartialEq)]
pub struct RunFinalization {
    pub status: RunStatus,
    pub records_processed: i64,
    pub error_message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Default number of runs returned by listings
pub const DEFAULT_RUN_LIMIT: i64 = 50;

/// Upper bound on runs returned by listings
pub const MAX_RUN_LIMIT: i64 = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFilter {
    #[serde(default)]
    pub source_code: Option<String>,
    #[serde(default)]
    pub status: Option<RunStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl RunFilter {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT)
    }
}

/// A run still marked `running` past the liveness threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleRun {
    #[serde(flatten)]
    pub run: IngestionRun,
    pub running_for_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("ingestion run {0} not found")]
    NotFound(RunId),

    #[error("ingestion run {0} is already finalized")]
    AlreadyFinalized(RunId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Lifecycle bookkeeping for ingestion runs
#[derive(Clone)]
pub struct RunTracker {
    store: Arc<dyn RunStore>,
}

impl RunTracker {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// Open a new run in `running` state
    #[tracing::instrument(skip(self))]
    pub async fn begin(&self, source_id: SourceId) -> Result<RunId, RunError> {
        let run_id = self.store.insert_run(source_id, Utc::now()).await?;
        info!(run_id, "Ingestion run started");
        Ok(run_id)
    }

    /// Finalize a run as succeeded
    ///
    /// Skips do not fail a run; their tally is kept in the error message so a
    /// partial run is visible after the fact.
    #[tracing::instrument(skip(self, skips), fields(skipped = skips.total()))]
    pub async fn complete(
        &self,
        run_id: RunId,
        records_processed: u64,
        skips: &SkipTally,
    ) -> Result<(), RunError> {
        self.finalize(
            run_id,
            RunFinalization {
                status: RunStatus::Succeeded,
                records_processed: saturating_i64(records_processed),
                error_message: skips.summary(),
                completed_at: Utc::now(),
            },
        )
        .await
    }

    /// Finalize a run as failed with the triggering error
    #[tracing::instrument(skip(self, skips), fields(skipped = skips.total()))]
    pub async fn fail(
        &self,
        run_id: RunId,
        records_processed: u64,
        error: &str,
        skips: &SkipTally,
    ) -> Result<(), RunError> {
        let message = match skips.summary() {
            Some(skipped) => format!("{error}; {skipped}"),
            None => error.to_string(),
        };
        self.finalize(
            run_id,
            RunFinalization {
                status: RunStatus::Failed,
                records_processed: saturating_i64(records_processed),
                error_message: Some(message),
                completed_at: Utc::now(),
            },
        )
        .await
    }

    async fn finalize(&self, run_id: RunId, finalization: RunFinalization) -> Result<(), RunError> {
        let status = finalization.status;
        if self.store.finalize_run(run_id, &finalization).await? {
            info!(run_id, %status, records = finalization.records_processed, "Ingestion run finalized");
            return Ok(());
        }

        match self.store.get_run(run_id).await? {
            Some(run) => {
                warn!(run_id, current = %run.status, attempted = %status, "Run already finalized");
                Err(RunError::AlreadyFinalized(run_id))
            }
            None => Err(RunError::NotFound(run_id)),
        }
    }

    pub async fn get(&self, run_id: RunId) -> Result<IngestionRun, RunError> {
        self.store
            .get_run(run_id)
            .await?
            .ok_or(RunError::NotFound(run_id))
    }

    /// Most recent runs first
    pub async fn list(&self, filter: &RunFilter) -> Result<Vec<IngestionRun>, RunError> {
        Ok(self.store.list_runs(filter).await?)
    }

    /// Runs still `running` that started more than `threshold` ago
    pub async fn stale_runs(&self, threshold: Duration) -> Result<Vec<StaleRun>, RunError> {
        let now = Utc::now();
        let threshold = chrono::Duration::from_std(threshold)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        let runs = self.store.running_runs_started_before(now - threshold).await?;

        Ok(runs
            .into_iter()
            .map(|run| {
                let running_for_secs = (now - run.started_at).num_seconds().max(0) as u64;
                StaleRun {
                    run,
                    running_for_secs,
                }
            })
            .collect())
    }
}
