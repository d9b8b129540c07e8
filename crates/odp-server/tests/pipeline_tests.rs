//! Ingestion pipeline tests against the in-memory store
//!
//! Covers the end-to-end behaviour of one ingestion task: idempotent upserts,
//! per-record skips, partition routing, fetch retries and timeouts,
//! cancellation, same-source serialization and run bookkeeping.

mod common;

use common::{
    fast_settings, imf, key_for, orchestrator, seeded_store, wb, FlakyCollector, GatedCollector,
    StallingCollector,
};
use odp_server::catalog::IndicatorMetadata;
use odp_server::ingest::{
    route, Collector, CollectorError, IngestError, IngestRequest, RawRecord, RunStatus,
    StaticCollector,
};
use odp_server::store::{CatalogStore, ReadStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn gdp(iso: &str, year: i32, value: f64) -> RawRecord {
    RawRecord::new(iso, "GDP.PCAP", year, value)
}

async fn wait_for_running(store: &odp_server::store::MemoryStore, expected: usize) {
    for _ in 0..200 {
        let running = store
            .runs()
            .await
            .iter()
            .filter(|run| run.status == RunStatus::Running)
            .count();
        if running == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {expected} running run(s)");
}

#[tokio::test]
async fn test_last_write_wins_and_unknown_country_is_skipped() {
    let store = seeded_store().await;
    let records = vec![
        gdp("USA", 2020, 63000.0),
        gdp("USA", 2020, 63500.0),
        gdp("ZZZ", 2020, 100.0),
    ];
    let orch = orchestrator(
        &store,
        vec![Arc::new(StaticCollector::new(wb(), records)) as Arc<dyn Collector>],
        fast_settings(),
    );

    let summary = orch
        .ingest(IngestRequest::new("WB", 2000, 2025), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Succeeded);
    assert_eq!(summary.records_processed, 1);
    assert_eq!(summary.records_skipped, 1);
    assert_eq!(summary.upserts, 2);
    assert_eq!((summary.inserted, summary.updated), (1, 1));
    assert_eq!(summary.skips_by_reason.get("unknown_country"), Some(&1));

    let indicators = store.indicators().await;
    assert_eq!(indicators.len(), 1);
    assert_eq!(indicators[0].code, "GDP.PCAP");

    let key = key_for(&store, "WB", "USA", "GDP.PCAP", 2020).await;
    let row = store.observation(key).await.unwrap();
    assert_eq!(row.value, Some(63500.0));
    assert_eq!(store.all_observations().await.len(), 1);

    let runs = store.runs().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Succeeded);
    assert_eq!(runs[0].records_processed, 1);
    assert!(runs[0].completed_at.is_some());
    assert!(runs[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("unknown country: ZZZ"));

    let source = store.find_source("WB").await.unwrap().unwrap();
    assert!(source.last_updated.is_some());
}

#[tokio::test]
async fn test_reingesting_the_same_records_is_idempotent() {
    let store = seeded_store().await;
    let records = vec![
        gdp("USA", 1995, 28000.0),
        gdp("DEU", 2005, 34000.0),
        gdp("FRA", 2021, 43000.0).estimated(),
    ];
    let orch = orchestrator(
        &store,
        vec![Arc::new(StaticCollector::new(wb(), records)) as Arc<dyn Collector>],
        fast_settings(),
    );

    let first = orch
        .ingest(IngestRequest::new("WB", 1990, 2025), CancellationToken::new())
        .await
        .unwrap();
    let snapshot: Vec<_> = store
        .all_observations()
        .await
        .into_iter()
        .map(|(partition, key, row)| (partition, key, row.value, row.is_estimated))
        .collect();

    let second = orch
        .ingest(IngestRequest::new("WB", 1990, 2025), CancellationToken::new())
        .await
        .unwrap();
    let after: Vec<_> = store
        .all_observations()
        .await
        .into_iter()
        .map(|(partition, key, row)| (partition, key, row.value, row.is_estimated))
        .collect();

    assert_eq!(snapshot, after);
    assert_eq!((first.inserted, first.updated), (3, 0));
    assert_eq!((second.inserted, second.updated), (0, 3));
    assert_eq!(store.indicators().await.len(), 1);
    assert_eq!(store.runs().await.len(), 2);
}

#[tokio::test]
async fn test_rows_land_in_their_decade_partition() {
    let store = seeded_store().await;
    let records = vec![
        gdp("USA", 1990, 1.0),
        gdp("USA", 1999, 2.0),
        gdp("USA", 2000, 3.0),
        gdp("USA", 2099, 4.0),
    ];
    let orch = orchestrator(
        &store,
        vec![Arc::new(StaticCollector::new(wb(), records)) as Arc<dyn Collector>],
        fast_settings(),
    );

    let summary = orch
        .ingest(IngestRequest::new("WB", 1900, 2099), CancellationToken::new())
        .await
        .unwrap();
    assert!(summary.succeeded());

    let rows = store.all_observations().await;
    assert_eq!(rows.len(), 4);
    for (partition, key, _) in &rows {
        assert!(partition.contains(key.year));
        assert_eq!(*partition, route(key.year).unwrap());
    }
    assert_eq!(store.used_partitions().await.len(), 3);
}

#[tokio::test]
async fn test_malformed_records_are_skipped_without_failing_the_run() {
    let store = seeded_store().await;
    let items = vec![
        Ok(gdp("USA", 2010, 1.0)),
        Ok(RawRecord::new("USA", "GDP.PCAP", "19x5", 2.0)),
        Ok(gdp("DEU", 2010, 3.0)),
        Ok(RawRecord::new("USA", "GDP.PCAP", 2011, "abc")),
        Err(CollectorError::Malformed("line 5: expected value".to_string())),
        Ok(RawRecord::new("", "GDP.PCAP", 2012, 4.0)),
        Ok(gdp("FRA", 2010, 5.0)),
        Ok(RawRecord::new("USA", "GDP.PCAP", 2013, "..")),
    ];
    let orch = orchestrator(
        &store,
        vec![Arc::new(StaticCollector::from_results(wb(), items)) as Arc<dyn Collector>],
        fast_settings(),
    );

    let summary = orch
        .ingest(IngestRequest::new("WB", 2000, 2020), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Succeeded);
    assert_eq!(summary.upserts, 4);
    assert_eq!(summary.records_skipped, 4);
    assert_eq!(summary.skips_by_reason.get("bad_year"), Some(&1));
    assert_eq!(summary.skips_by_reason.get("unparsable_value"), Some(&1));
    assert_eq!(summary.skips_by_reason.get("malformed_record"), Some(&1));
    assert_eq!(summary.skips_by_reason.get("missing_country_code"), Some(&1));

    let missing = key_for(&store, "WB", "USA", "GDP.PCAP", 2013).await;
    assert_eq!(store.observation(missing).await.unwrap().value, None);
}

#[tokio::test]
async fn test_nineteenth_century_records_are_stored() {
    let store = seeded_store().await;
    let mut records = vec![gdp("USA", 1850, 2.0)];
    records.extend((1990..2020).map(|year| gdp("USA", year, f64::from(year))));
    let orch = orchestrator(
        &store,
        vec![Arc::new(StaticCollector::new(wb(), records)) as Arc<dyn Collector>],
        fast_settings(),
    );

    let summary = orch
        .ingest(IngestRequest::new("WB", 1800, 2020), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Succeeded);
    assert_eq!(summary.records_processed, 31);
    assert_eq!(summary.records_skipped, 0);

    let early = key_for(&store, "WB", "USA", "GDP.PCAP", 1850).await;
    assert_eq!(store.observation(early).await.unwrap().value, Some(2.0));
    let partitions = store.used_partitions().await;
    assert!(partitions.contains(&route(1850).unwrap()));
}

#[tokio::test]
async fn test_store_outage_mid_run_marks_the_run_failed() {
    let store = seeded_store().await;
    let records = vec![gdp("USA", 2000, 1.0), gdp("USA", 2001, 2.0), gdp("USA", 2002, 3.0)];
    let orch = orchestrator(
        &store,
        vec![Arc::new(StaticCollector::new(wb(), records)) as Arc<dyn Collector>],
        fast_settings(),
    );
    store.fail_upserts_after(1);

    let summary = orch
        .ingest(IngestRequest::new("WB", 2000, 2010), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.records_processed, 1);
    assert!(summary.error.as_deref().unwrap().starts_with("infrastructure unavailable"));
    assert_eq!(store.all_observations().await.len(), 1);
    assert_eq!(store.runs().await[0].status, RunStatus::Failed);
}

#[tokio::test]
async fn test_store_down_before_the_run_is_an_error() {
    let store = seeded_store().await;
    let orch = orchestrator(
        &store,
        vec![Arc::new(StaticCollector::new(wb(), vec![gdp("USA", 2000, 1.0)])) as Arc<dyn Collector>],
        fast_settings(),
    );
    store.set_unavailable(true);

    let result = orch
        .ingest(IngestRequest::new("WB", 2000, 2010), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(IngestError::Infrastructure(_))));

    store.set_unavailable(false);
    assert!(store.runs().await.is_empty());
    assert!(store.ping().await.is_ok());
}

#[tokio::test]
async fn test_requests_are_validated_before_a_run_starts() {
    let store = seeded_store().await;
    let orch = orchestrator(
        &store,
        vec![Arc::new(StaticCollector::new(wb(), vec![])) as Arc<dyn Collector>],
        fast_settings(),
    );

    let unknown = orch
        .ingest(IngestRequest::new("NOPE", 2000, 2010), CancellationToken::new())
        .await;
    assert!(matches!(unknown, Err(IngestError::UnknownSource(code)) if code == "NOPE"));

    let inverted = orch
        .ingest(IngestRequest::new("WB", 2010, 2000), CancellationToken::new())
        .await;
    assert!(matches!(
        inverted,
        Err(IngestError::InvalidYearRange { start: 2010, end: 2000 })
    ));

    assert!(store.runs().await.is_empty());
}

#[tokio::test]
async fn test_empty_fetch_succeeds_with_zero_records() {
    let store = seeded_store().await;
    let orch = orchestrator(
        &store,
        vec![Arc::new(StaticCollector::new(wb(), vec![])) as Arc<dyn Collector>],
        fast_settings(),
    );

    let summary = orch
        .ingest(IngestRequest::new("WB", 2000, 2010), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Succeeded);
    assert_eq!(summary.records_processed, 0);
    assert_eq!(store.runs().await[0].error_message, None);
}

#[tokio::test]
async fn test_new_indicator_takes_metadata_and_category() {
    let store = seeded_store().await;
    let metadata = IndicatorMetadata {
        name: Some("Solar capacity".to_string()),
        unit: Some("MW".to_string()),
        category_code: Some("renewables".to_string()),
        category_name: Some("Renewables".to_string()),
        parent_category_code: Some("ENERGY".to_string()),
        ..Default::default()
    };
    let records = vec![RawRecord::new("DEU", "SOLAR.CAP", 2020, 53000.0).with_metadata(metadata)];
    let orch = orchestrator(
        &store,
        vec![Arc::new(StaticCollector::new(
            odp_server::catalog::reference::source_descriptor("IRENA"),
            records,
        )) as Arc<dyn Collector>],
        fast_settings(),
    );

    let summary = orch
        .ingest(IngestRequest::new("IRENA", 2020, 2020), CancellationToken::new())
        .await
        .unwrap();
    assert!(summary.succeeded());

    let indicator = store.indicators().await.pop().unwrap();
    assert_eq!(indicator.name, "Solar capacity");
    assert_eq!(indicator.unit.as_deref(), Some("MW"));
    assert_eq!(indicator.frequency, "annual");

    let category = store.find_category("RENEWABLES").await.unwrap().unwrap();
    let energy = store.find_category("ENERGY").await.unwrap().unwrap();
    assert_eq!(indicator.category_id, Some(category.id));
    assert_eq!(category.parent_id, Some(energy.id));
}

#[tokio::test(start_paused = true)]
async fn test_transient_fetch_errors_are_retried() {
    let store = seeded_store().await;
    let flaky = Arc::new(FlakyCollector::new(
        wb(),
        vec![gdp("USA", 2000, 1.0), gdp("USA", 2001, 2.0)],
        2,
    ));
    let orch = orchestrator(&store, vec![flaky.clone() as Arc<dyn Collector>], fast_settings());

    let summary = orch
        .ingest(IngestRequest::new("WB", 2000, 2010), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Succeeded);
    assert_eq!(summary.fetch_attempts, 3);
    assert_eq!(flaky.fetches(), 3);
    assert_eq!(summary.records_processed, 2);
    assert_eq!(summary.upserts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() {
    let store = seeded_store().await;
    let flaky = Arc::new(FlakyCollector::new(wb(), vec![gdp("USA", 2000, 1.0)], u32::MAX));
    let orch = orchestrator(&store, vec![flaky.clone() as Arc<dyn Collector>], fast_settings());

    let summary = orch
        .ingest(IngestRequest::new("WB", 2000, 2010), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.fetch_attempts, 3);
    assert_eq!(flaky.fetches(), 3);
    assert!(summary
        .error
        .as_deref()
        .unwrap()
        .contains("fetch failed after 3 attempt(s)"));
    assert_eq!(summary.records_processed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_fetch_times_out() {
    let store = seeded_store().await;
    let stalling = Arc::new(StallingCollector::new(wb(), vec![gdp("USA", 2000, 1.0)]));
    let orch = orchestrator(&store, vec![stalling as Arc<dyn Collector>], fast_settings());

    let summary = orch
        .ingest(IngestRequest::new("WB", 2000, 2010), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.fetch_attempts, 3);
    assert_eq!(summary.upserts, 1);
    assert!(summary.error.as_deref().unwrap().contains("no record within"));
}

#[tokio::test]
async fn test_cancellation_finalizes_the_run_as_failed() {
    let store = seeded_store().await;
    let gated = Arc::new(GatedCollector::new(wb(), vec![gdp("USA", 2000, 1.0)]));
    let orch = orchestrator(&store, vec![gated.clone() as Arc<dyn Collector>], fast_settings());
    let cancel = CancellationToken::new();

    let task = {
        let orch = orch.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { orch.ingest(IngestRequest::new("WB", 2000, 2010), cancel).await })
    };
    wait_for_running(&store, 1).await;
    cancel.cancel();

    let summary = task.await.unwrap().unwrap();
    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(summary.error.as_deref(), Some("cancelled"));
    assert_eq!(summary.records_processed, 1);
    assert_eq!(store.runs().await[0].status, RunStatus::Failed);

    gated.gate().add_permits(1);
    let next = orch
        .ingest(IngestRequest::new("WB", 2000, 2010), CancellationToken::new())
        .await
        .unwrap();
    assert!(next.succeeded(), "source lock was released by the cancelled run");
}

#[tokio::test]
async fn test_same_source_tasks_run_one_at_a_time() {
    let store = seeded_store().await;
    let gated = Arc::new(GatedCollector::new(wb(), vec![gdp("USA", 2000, 1.0)]));
    let orch = orchestrator(&store, vec![gated.clone() as Arc<dyn Collector>], fast_settings());

    let spawn = |orch: Arc<odp_server::ingest::Orchestrator>| {
        tokio::spawn(async move {
            orch.ingest(IngestRequest::new("WB", 2000, 2010), CancellationToken::new())
                .await
        })
    };
    let first = spawn(orch.clone());
    wait_for_running(&store, 1).await;
    let second = spawn(orch.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.runs().await.len(), 1, "second task waits for the source lock");

    gated.gate().add_permits(2);
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert!(first.succeeded() && second.succeeded());

    let runs = store.runs().await;
    assert_eq!(runs.len(), 2);
    let first_done = runs[0].completed_at.unwrap();
    assert!(runs[1].started_at >= first_done);
}

#[tokio::test]
async fn test_source_code_case_does_not_split_the_lock() {
    let store = seeded_store().await;
    let gated = Arc::new(GatedCollector::new(wb(), vec![gdp("USA", 2000, 1.0)]));
    let orch = orchestrator(&store, vec![gated.clone() as Arc<dyn Collector>], fast_settings());

    let spawn = |orch: Arc<odp_server::ingest::Orchestrator>, code: &str| {
        let request = IngestRequest {
            source_code: code.to_string(),
            start_year: 2000,
            end_year: 2010,
        };
        tokio::spawn(async move { orch.ingest(request, CancellationToken::new()).await })
    };
    let first = spawn(orch.clone(), "WB");
    wait_for_running(&store, 1).await;
    let second = spawn(orch.clone(), " wb ");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.runs().await.len(), 1, "lower-case request waits for the same lock");

    gated.gate().add_permits(2);
    first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert!(second.succeeded());
    assert_eq!(second.source_code, "WB");
}

#[tokio::test]
async fn test_waiting_for_the_source_lock_can_be_cancelled() {
    let store = seeded_store().await;
    let gated = Arc::new(GatedCollector::new(wb(), vec![gdp("USA", 2000, 1.0)]));
    let orch = orchestrator(&store, vec![gated.clone() as Arc<dyn Collector>], fast_settings());

    let holder = {
        let orch = orch.clone();
        tokio::spawn(async move {
            orch.ingest(IngestRequest::new("WB", 2000, 2010), CancellationToken::new())
                .await
        })
    };
    wait_for_running(&store, 1).await;

    let cancel = CancellationToken::new();
    let waiter = {
        let orch = orch.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { orch.ingest(IngestRequest::new("WB", 2000, 2010), cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    assert!(matches!(waiter.await.unwrap(), Err(IngestError::Cancelled)));
    gated.gate().add_permits(1);
    assert!(holder.await.unwrap().unwrap().succeeded());
    assert_eq!(store.runs().await.len(), 1);
}

#[tokio::test]
async fn test_ingest_many_isolates_failures_and_keeps_order() {
    let store = seeded_store().await;
    let orch = orchestrator(
        &store,
        vec![
            Arc::new(StaticCollector::new(wb(), vec![gdp("USA", 2000, 1.0)])) as Arc<dyn Collector>,
            Arc::new(StaticCollector::from_results(
                imf(),
                vec![Err(CollectorError::Permanent("HTTP 404".to_string()))],
            )) as Arc<dyn Collector>,
        ],
        fast_settings(),
    );

    let results = orch
        .ingest_many(
            vec![
                IngestRequest::new("WB", 2000, 2010),
                IngestRequest::new("NOPE", 2000, 2010),
                IngestRequest::new("IMF", 2000, 2010),
            ],
            CancellationToken::new(),
        )
        .await;

    assert_eq!(results.len(), 3);
    let wb_summary = results[0].as_ref().unwrap();
    assert_eq!(wb_summary.source_code, "WB");
    assert!(wb_summary.succeeded());
    assert!(matches!(results[1], Err(IngestError::UnknownSource(_))));
    let imf_summary = results[2].as_ref().unwrap();
    assert_eq!(imf_summary.status, RunStatus::Failed);
    assert_eq!(imf_summary.error.as_deref(), Some("fetch failed: HTTP 404"));
}

#[tokio::test]
async fn test_stale_runs_are_reported_not_resumed() {
    let store = seeded_store().await;
    let gated = Arc::new(GatedCollector::new(wb(), vec![]));
    let orch = orchestrator(&store, vec![gated.clone() as Arc<dyn Collector>], fast_settings());

    let task = {
        let orch = orch.clone();
        tokio::spawn(async move {
            orch.ingest(IngestRequest::new("WB", 2000, 2010), CancellationToken::new())
                .await
        })
    };
    wait_for_running(&store, 1).await;

    let stale = orch.runs().stale_runs(Duration::ZERO).await.unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].run.source_code, "WB");
    assert!(orch
        .runs()
        .stale_runs(Duration::from_secs(3600))
        .await
        .unwrap()
        .is_empty());

    gated.gate().add_permits(1);
    assert!(task.await.unwrap().unwrap().succeeded());
    assert!(orch.runs().stale_runs(Duration::ZERO).await.unwrap().is_empty());
}
