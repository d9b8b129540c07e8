//! Ingestion orchestration
//!
//! One task per `(source, year range)` request:
//!
//! 1. validate the request and register the source from its collector
//! 2. take the per-source lock, then open a run
//! 3. stream records: normalize, resolve, upsert; record-level failures are
//!    counted as skips and never stop the loop
//! 4. finalize the run exactly once and release the lock
//!
//! Transient fetch failures restart the collector stream with exponential
//! backoff, skipping records that were already consumed. Store and partition
//! failures end the task. Cancellation is cooperative and checked after every
//! record and while waiting on the collector.

use chrono::Utc;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogResolver, ResolveError, SourceId};
use crate::store::{CatalogStore, ObservationStore, RunStore, SourceLocks, StoreError};

use super::collector::{Collector, CollectorError, CollectorRegistry};
use super::normalize::{normalize, MAX_YEAR, MIN_YEAR};
use super::partition::NoPartitionForYear;
use super::runs::{RunError, RunId, RunStatus, RunTracker};
use super::types::{
    IngestRequest, ObservationDraft, ObservationKey, RawRecord, RunSummary, SkipReason,
    SkipTally, UpsertOutcome,
};
use super::upsert::{UpsertEngine, UpsertError};

pub const DEFAULT_MAX_FETCH_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    /// Collector passes per task, including the first
    pub max_fetch_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Longest wait for the next item of a collector stream
    pub fetch_timeout: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_fetch_attempts: DEFAULT_MAX_FETCH_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl IngestSettings {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_max)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("invalid year range {start}-{end}")]
    InvalidYearRange { start: i32, end: i32 },

    #[error("fetch failed after {attempts} attempt(s): {message}")]
    TransientFetch { attempts: u32, message: String },

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("no partition covers year {0}")]
    PartitionMissing(i32),

    #[error("infrastructure unavailable: {0}")]
    Infrastructure(#[source] StoreError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("cancelled")]
    Cancelled,

    #[error("ingestion aborted: {0}")]
    Aborted(String),
}

impl IngestError {
    /// Stable label for logs and API error codes
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::UnknownSource(_) => "unknown_source",
            IngestError::InvalidYearRange { .. } => "invalid_year_range",
            IngestError::TransientFetch { .. } => "transient_fetch",
            IngestError::FetchFailed(_) => "fetch_failed",
            IngestError::PartitionMissing(_) => "partition_missing",
            IngestError::Infrastructure(_) => "infrastructure_unavailable",
            IngestError::Run(_) => "run_tracking",
            IngestError::Cancelled => "cancelled",
            IngestError::Aborted(_) => "aborted",
        }
    }
}

impl From<ResolveError> for IngestError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Store(err) => IngestError::Infrastructure(err),
            ResolveError::UnknownSource(code) => IngestError::UnknownSource(code),
            other => IngestError::Aborted(other.to_string()),
        }
    }
}

impl From<UpsertError> for IngestError {
    fn from(err: UpsertError) -> Self {
        match err {
            UpsertError::NoPartition(NoPartitionForYear(year)) => IngestError::PartitionMissing(year),
            UpsertError::Store(err) => IngestError::Infrastructure(err),
        }
    }
}

/// Counters accumulated while a run is in flight
#[derive(Debug, Default)]
struct Progress {
    keys: HashSet<ObservationKey>,
    skips: SkipTally,
    upserts: u64,
    inserted: u64,
    updated: u64,
    fetch_attempts: u32,
    /// Stream positions already handled, so a restarted fetch can skip them
    consumed: usize,
}

impl Progress {
    fn skip(&mut self, reason: SkipReason) {
        debug!(reason = reason.kind(), error = %reason, "Skipping record");
        self.skips.record(&reason);
    }

    fn written(&mut self, key: ObservationKey, outcome: UpsertOutcome) {
        self.upserts += 1;
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
        self.keys.insert(key);
    }

    fn records_processed(&self) -> u64 {
        u64::try_from(self.keys.len()).unwrap_or(u64::MAX)
    }
}

pub struct Orchestrator {
    resolver: CatalogResolver,
    upserts: UpsertEngine,
    runs: RunTracker,
    catalog: Arc<dyn CatalogStore>,
    locks: Arc<dyn SourceLocks>,
    collectors: CollectorRegistry,
    settings: IngestSettings,
}

impl Orchestrator {
    pub fn new<S>(store: Arc<S>, collectors: CollectorRegistry, settings: IngestSettings) -> Self
    where
        S: CatalogStore + ObservationStore + RunStore + SourceLocks + 'static,
    {
        Self {
            resolver: CatalogResolver::new(store.clone()),
            upserts: UpsertEngine::new(store.clone()),
            runs: RunTracker::new(store.clone()),
            catalog: store.clone(),
            locks: store,
            collectors,
            settings,
        }
    }

    pub fn runs(&self) -> &RunTracker {
        &self.runs
    }

    pub fn collectors(&self) -> &CollectorRegistry {
        &self.collectors
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Run one ingestion task to completion
    ///
    /// Errors are returned only when the task could not start (bad request,
    /// unknown source, store down before the run row existed, cancelled while
    /// waiting for the source lock). Once a run exists, every outcome is
    /// reported through the [`RunSummary`], including failures.
    #[tracing::instrument(
        name = "ingest",
        skip(self, request, cancel),
        fields(source = %request.source_code, start = request.start_year, end = request.end_year)
    )]
    pub async fn ingest(
        &self,
        request: IngestRequest,
        cancel: CancellationToken,
    ) -> Result<RunSummary, IngestError> {
        // the lock key must not depend on how the caller spelled the code
        let request = IngestRequest::new(&request.source_code, request.start_year, request.end_year);
        validate_range(&request)?;
        let collector = self
            .collectors
            .get(&request.source_code)
            .ok_or_else(|| IngestError::UnknownSource(request.source_code.clone()))?;
        let source_id = self.resolver.ensure_source(&collector.descriptor()).await?;

        let lock = tokio::select! {
            lock = self.locks.lock_source(&request.source_code) => {
                lock.map_err(IngestError::Infrastructure)?
            }
            _ = cancel.cancelled() => return Err(IngestError::Cancelled),
        };

        let run_id = match self.runs.begin(source_id).await {
            Ok(run_id) => run_id,
            Err(err) => {
                if let Err(release_err) = lock.release().await {
                    warn!(error = %release_err, "Failed to release source lock");
                }
                return Err(err.into());
            }
        };

        let started = Instant::now();
        let mut progress = Progress::default();
        let outcome = self
            .drive(&request, collector.as_ref(), &mut progress, &cancel)
            .await;

        let summary = self
            .finish(run_id, source_id, &request, &progress, outcome, started)
            .await;

        if let Err(err) = lock.release().await {
            warn!(run_id, error = %err, "Failed to release source lock");
        }
        Ok(summary)
    }

    /// Run every request as its own task; results keep the request order
    pub async fn ingest_many(
        self: &Arc<Self>,
        requests: Vec<IngestRequest>,
        cancel: CancellationToken,
    ) -> Vec<Result<RunSummary, IngestError>> {
        let mut results: Vec<Option<Result<RunSummary, IngestError>>> =
            requests.iter().map(|_| None).collect();

        let mut tasks = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let orchestrator = Arc::clone(self);
            let cancel = cancel.clone();
            tasks.spawn(async move { (index, orchestrator.ingest(request, cancel).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(slot) = results.get_mut(index) {
                        *slot = Some(result);
                    }
                }
                Err(err) => error!(error = %err, "Ingestion task panicked"),
            }
        }

        results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| Err(IngestError::Aborted("ingestion task panicked".to_string())))
            })
            .collect()
    }

    async fn drive(
        &self,
        request: &IngestRequest,
        collector: &dyn Collector,
        progress: &mut Progress,
        cancel: &CancellationToken,
    ) -> Result<(), IngestError> {
        let max_attempts = self.settings.max_fetch_attempts.max(1);

        loop {
            progress.fetch_attempts += 1;
            let attempt = progress.fetch_attempts;
            debug!(attempt, skip_first = progress.consumed, "Fetching");

            let failure = match self.fetch_pass(request, collector, progress, cancel).await? {
                None => return Ok(()),
                Some(err) => err,
            };

            match failure {
                CollectorError::Transient(message) => {
                    if attempt >= max_attempts {
                        return Err(IngestError::TransientFetch {
                            attempts: attempt,
                            message,
                        });
                    }
                    let delay = self.settings.backoff_delay(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %message, "Transient fetch failure, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(IngestError::Cancelled),
                    }
                }
                CollectorError::Permanent(message) => return Err(IngestError::FetchFailed(message)),
                CollectorError::Malformed(message) => return Err(IngestError::Aborted(message)),
            }
        }
    }

    /// One pass over the collector stream
    ///
    /// Returns the fetch error that interrupted the pass, if any.
    async fn fetch_pass(
        &self,
        request: &IngestRequest,
        collector: &dyn Collector,
        progress: &mut Progress,
        cancel: &CancellationToken,
    ) -> Result<Option<CollectorError>, IngestError> {
        let timeout = self.settings.fetch_timeout;
        let mut stream = collector.fetch(request.start_year, request.end_year);
        let mut position = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(IngestError::Cancelled),
                next = tokio::time::timeout(timeout, stream.next()) => next,
            };

            let item = match next {
                Err(_) => {
                    return Ok(Some(CollectorError::Transient(format!(
                        "no record within {}s",
                        timeout.as_secs_f64()
                    ))))
                }
                Ok(None) => return Ok(None),
                Ok(Some(item)) => item,
            };
            position += 1;

            match item {
                Err(err @ (CollectorError::Transient(_) | CollectorError::Permanent(_))) => {
                    return Ok(Some(err))
                }
                _ if position <= progress.consumed => continue,
                Ok(raw) => {
                    progress.consumed = position;
                    self.process(&request.source_code, raw, progress).await?;
                }
                Err(CollectorError::Malformed(message)) => {
                    progress.consumed = position;
                    progress.skip(SkipReason::MalformedRecord(message));
                }
            }

            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }
        }
    }

    /// Normalize, resolve and upsert one record
    async fn process(
        &self,
        source_code: &str,
        raw: RawRecord,
        progress: &mut Progress,
    ) -> Result<(), IngestError> {
        let record = match normalize(source_code, &raw) {
            Ok(record) => record,
            Err(reason) => {
                progress.skip(reason);
                return Ok(());
            }
        };

        let ids = match self
            .resolver
            .resolve(
                source_code,
                &record.indicator_code,
                &record.country_iso3,
                record.metadata.as_ref(),
            )
            .await
        {
            Ok(ids) => ids,
            Err(err) => {
                progress.skip(err.into_skip()?);
                return Ok(());
            }
        };

        let draft = ObservationDraft {
            country_id: ids.country_id,
            indicator_id: ids.indicator_id,
            year: record.year,
            value: record.value,
            is_estimated: record.is_estimated,
            source_note: record.source_note,
        };
        let outcome = self.upserts.upsert(&draft).await?;
        progress.written(draft.key(), outcome);
        Ok(())
    }

    /// Finalize the run and build its summary
    async fn finish(
        &self,
        run_id: RunId,
        source_id: SourceId,
        request: &IngestRequest,
        progress: &Progress,
        outcome: Result<(), IngestError>,
        started: Instant,
    ) -> RunSummary {
        let records = progress.records_processed();

        let (status, error) = match outcome {
            Ok(()) => match self.runs.complete(run_id, records, &progress.skips).await {
                Ok(()) => {
                    if let Err(err) = self.catalog.touch_source(source_id, Utc::now()).await {
                        warn!(run_id, error = %err, "Failed to update source timestamp");
                    }
                    (RunStatus::Succeeded, None)
                }
                Err(err) => {
                    error!(run_id, error = %err, "Could not record successful run");
                    (RunStatus::Failed, Some(err.to_string()))
                }
            },
            Err(cause) => {
                let message = cause.to_string();
                if let Err(err) = self
                    .runs
                    .fail(run_id, records, &message, &progress.skips)
                    .await
                {
                    error!(run_id, error = %err, "Could not record failed run");
                }
                error!(run_id, kind = cause.kind(), error = %message, records, "Ingestion run failed");
                (RunStatus::Failed, Some(message))
            }
        };

        let summary = RunSummary {
            run_id,
            source_code: request.source_code.clone(),
            status,
            records_processed: records,
            records_skipped: progress.skips.total(),
            skips_by_reason: progress.skips.by_reason().clone(),
            upserts: progress.upserts,
            inserted: progress.inserted,
            updated: progress.updated,
            fetch_attempts: progress.fetch_attempts,
            duration: started.elapsed(),
            error,
        };

        if summary.succeeded() {
            info!(
                run_id,
                records = summary.records_processed,
                skipped = summary.records_skipped,
                upserts = summary.upserts,
                duration_ms = summary.duration.as_millis() as u64,
                "Ingestion run succeeded"
            );
        }
        summary
    }
}

fn validate_range(request: &IngestRequest) -> Result<(), IngestError> {
    let bounds = MIN_YEAR..=MAX_YEAR;
    if request.start_year > request.end_year
        || !bounds.contains(&request.start_year)
        || !bounds.contains(&request.end_year)
    {
        return Err(IngestError::InvalidYearRange {
            start: request.start_year,
            end: request.end_year,
        });
    }
    Ok(())
}
