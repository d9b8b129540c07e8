//! Run history and stale-run report

use anyhow::Result;
use odp_server::ingest::{IngestionRun, RunFilter, RunStatus, RunTracker};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::{connect, Output};

pub async fn list(
    source: Option<String>,
    status: Option<String>,
    limit: i64,
    output: &Output,
) -> Result<()> {
    let status = status.as_deref().map(str::parse::<RunStatus>).transpose()?;
    let (_, store) = connect().await?;
    let tracker = RunTracker::new(Arc::new(store));

    let filter = RunFilter {
        source_code: source.map(|code| code.trim().to_uppercase()),
        status,
        limit: Some(limit),
    };
    let runs = tracker.list(&filter).await?;

    if output.json {
        return output.print_json(&json!(runs));
    }
    print_runs(output, &runs, |_| String::new());
    Ok(())
}

/// Returns exit code 1 when stale runs exist, so scripts can alert on it
pub async fn stale(threshold_secs: Option<u64>, output: &Output) -> Result<i32> {
    let (config, store) = connect().await?;
    let threshold = threshold_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.ingest.stale_run_threshold());
    let tracker = RunTracker::new(Arc::new(store));
    let stale = tracker.stale_runs(threshold).await?;

    if output.json {
        output.print_json(&json!(stale))?;
    } else if stale.is_empty() {
        println!("No runs older than {}s are still running", threshold.as_secs());
    } else {
        let runs: Vec<IngestionRun> = stale.iter().map(|entry| entry.run.clone()).collect();
        print_runs(output, &runs, |run| {
            stale
                .iter()
                .find(|entry| entry.run.id == run.id)
                .map(|entry| format!("running for {}s", entry.running_for_secs))
                .unwrap_or_default()
        });
    }

    Ok(if stale.is_empty() { 0 } else { 1 })
}

fn print_runs(output: &Output, runs: &[IngestionRun], note: impl Fn(&IngestionRun) -> String) {
    let mut table = output.table(&[
        "Run", "Source", "Status", "Started", "Completed", "Processed", "Error",
    ]);
    for run in runs {
        let error = run.error_message.clone().unwrap_or_else(|| note(run));
        table.add_row(vec![
            run.id.to_string(),
            run.source_code.clone(),
            run.status.to_string(),
            run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            run.completed_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            run.records_processed.to_string(),
            error,
        ]);
    }
    println!("{table}");
}
