//! One-shot ingestion from JSON-lines dumps

use anyhow::{Context, Result};
use odp_server::catalog::bootstrap::seed_reference_data;
use odp_server::config::Config;
use odp_server::ingest::{
    CollectorRegistry, IngestError, IngestRequest, IngestSettings, Orchestrator, RunSummary,
};
use odp_server::store::{CatalogStore, MemoryStore, ObservationStore, RunStore, SourceLocks};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Output;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub sources: Vec<String>,
    pub start: i32,
    pub end: i32,
    pub dir: Option<PathBuf>,
    pub dry_run: bool,
}

/// Returns exit code 0 when every run succeeded, 1 otherwise
pub async fn run(options: IngestOptions, output: &Output) -> Result<i32> {
    let config = Config::load()?;
    let dir = options
        .dir
        .clone()
        .unwrap_or_else(|| config.ingest.collector_dir.clone());
    let collectors = CollectorRegistry::from_directory(&dir)
        .with_context(|| format!("Failed to read collector directory {}", dir.display()))?;

    let settings = IngestSettings::from(&config.ingest);
    let requests: Vec<IngestRequest> = options
        .sources
        .iter()
        .map(|code| IngestRequest::new(code, options.start, options.end))
        .collect();

    let results = if options.dry_run {
        let store = Arc::new(MemoryStore::new());
        seed_reference_data(store.as_ref()).await?;
        info!("Dry run: writing to an in-memory store");
        ingest_all(store, collectors, settings, requests.clone()).await
    } else {
        let (_, store) = super::connect().await?;
        ingest_all(Arc::new(store), collectors, settings, requests.clone()).await
    };

    report(&requests, &results, output)?;

    let all_succeeded = results
        .iter()
        .all(|result| matches!(result, Ok(summary) if summary.succeeded()));
    Ok(if all_succeeded { 0 } else { 1 })
}

async fn ingest_all<S>(
    store: Arc<S>,
    collectors: CollectorRegistry,
    settings: IngestSettings,
    requests: Vec<IngestRequest>,
) -> Vec<Result<RunSummary, IngestError>>
where
    S: CatalogStore + ObservationStore + RunStore + SourceLocks + 'static,
{
    let orchestrator = Arc::new(Orchestrator::new(store, collectors, settings));
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling ingestion");
            interrupt.cancel();
        }
    });

    let results = orchestrator.ingest_many(requests, cancel).await;
    watcher.abort();
    results
}

fn report(
    requests: &[IngestRequest],
    results: &[Result<RunSummary, IngestError>],
    output: &Output,
) -> Result<()> {
    if output.json {
        let items: Vec<_> = requests
            .iter()
            .zip(results)
            .map(|(request, result)| match result {
                Ok(summary) => json!({ "request": request, "summary": summary }),
                Err(err) => json!({
                    "request": request,
                    "error": { "kind": err.kind(), "message": err.to_string() },
                }),
            })
            .collect();
        return output.print_json(&json!(items));
    }

    let mut table = output.table(&[
        "Source", "Run", "Status", "Processed", "Skipped", "Inserted", "Updated", "Duration",
        "Error",
    ]);
    for (request, result) in requests.iter().zip(results) {
        match result {
            Ok(summary) => {
                table.add_row(vec![
                    summary.source_code.clone(),
                    summary.run_id.to_string(),
                    summary.status.to_string(),
                    summary.records_processed.to_string(),
                    summary.records_skipped.to_string(),
                    summary.inserted.to_string(),
                    summary.updated.to_string(),
                    format!("{:.1}s", summary.duration.as_secs_f64()),
                    summary.error.clone().unwrap_or_default(),
                ]);
            }
            Err(err) => {
                table.add_row(vec![
                    request.source_code.clone(),
                    "-".to_string(),
                    "rejected".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    err.to_string(),
                ]);
            }
        }
    }
    println!("{table}");
    Ok(())
}
