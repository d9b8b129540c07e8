//! In-process store
//!
//! Mirrors the database constraints the pipeline relies on: unique catalog
//! keys, referential checks on observations, partition bounds, finalize-once
//! runs and per-source exclusive locks. Used by tests and `--dry-run`
//! ingestion. Failure injection hooks let tests simulate an unreachable store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::catalog::{
    Category, CategoryId, Country, Indicator, IndicatorId, NewCategory, NewCountry, NewIndicator,
    Source, SourceDescriptor, SourceId,
};
use crate::ingest::partition::Partition;
use crate::ingest::runs::{IngestionRun, RunFilter, RunFinalization, RunId, RunStatus};
use crate::ingest::types::{ObservationDraft, ObservationKey, UpsertOutcome};

use super::{
    CatalogStats, CatalogStore, HeldLock, IndicatorFilter, IndicatorView, ObservationQuery,
    ObservationStore, ObservationView, ReadStore, RunStore, SourceLock, SourceLocks, StoreError,
    StoreResult,
};

/// A stored observation row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObservation {
    pub value: Option<f64>,
    pub is_estimated: bool,
    pub source_note: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredRun {
    id: RunId,
    source_id: SourceId,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    status: RunStatus,
    records_processed: i64,
    error_message: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    countries: Vec<Country>,
    sources: Vec<Source>,
    categories: Vec<Category>,
    indicators: Vec<Indicator>,
    observations: BTreeMap<Partition, BTreeMap<ObservationKey, StoredObservation>>,
    runs: Vec<StoredRun>,
}

impl State {
    fn source_code(&self, source_id: SourceId) -> String {
        self.sources
            .iter()
            .find(|s| s.id == source_id)
            .map(|s| s.code.clone())
            .unwrap_or_default()
    }

    fn run_view(&self, run: &StoredRun) -> IngestionRun {
        IngestionRun {
            id: run.id,
            source_id: run.source_id,
            source_code: self.source_code(run.source_id),
            started_at: run.started_at,
            completed_at: run.completed_at,
            status: run.status,
            records_processed: run.records_processed,
            error_message: run.error_message.clone(),
        }
    }

    fn indicator_view(&self, indicator: &Indicator) -> IndicatorView {
        IndicatorView {
            id: indicator.id,
            source_code: self.source_code(indicator.source_id),
            category_code: indicator.category_id.and_then(|id| {
                self.categories
                    .iter()
                    .find(|c| c.id == id)
                    .map(|c| c.code.clone())
            }),
            code: indicator.code.clone(),
            name: indicator.name.clone(),
            unit: indicator.unit.clone(),
            frequency: indicator.frequency.clone(),
        }
    }
}

fn next_id(len: usize) -> StoreResult<i32> {
    i32::try_from(len + 1).map_err(|_| StoreError::Integrity("id space exhausted".to_string()))
}

#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<State>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    unavailable: AtomicBool,
    upsert_budget: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            locks: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            upsert_budget: AtomicUsize::new(usize::MAX),
        }
    }

    /// Make every operation fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Allow `n` more observation upserts, then report the store as unavailable
    pub fn fail_upserts_after(&self, n: usize) {
        self.upsert_budget.store(n, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }

    fn take_upsert_budget(&self) -> StoreResult<()> {
        let taken = self
            .upsert_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| match budget {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            });
        taken
            .map(|_| ())
            .map_err(|_| StoreError::Unavailable("observation writes are failing".to_string()))
    }

    pub async fn observation(&self, key: ObservationKey) -> Option<StoredObservation> {
        let state = self.state.read().await;
        state
            .observations
            .values()
            .find_map(|rows| rows.get(&key).cloned())
    }

    /// Keys stored in one partition
    pub async fn partition_keys(&self, partition: Partition) -> Vec<ObservationKey> {
        let state = self.state.read().await;
        state
            .observations
            .get(&partition)
            .map(|rows| rows.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Every stored row with the partition holding it
    pub async fn all_observations(&self) -> Vec<(Partition, ObservationKey, StoredObservation)> {
        let state = self.state.read().await;
        state
            .observations
            .iter()
            .flat_map(|(partition, rows)| {
                rows.iter()
                    .map(move |(key, row)| (*partition, *key, row.clone()))
            })
            .collect()
    }

    /// Distinct partitions currently holding rows
    pub async fn used_partitions(&self) -> HashSet<Partition> {
        let state = self.state.read().await;
        state
            .observations
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(partition, _)| *partition)
            .collect()
    }

    pub async fn indicators(&self) -> Vec<Indicator> {
        self.state.read().await.indicators.clone()
    }

    pub async fn runs(&self) -> Vec<IngestionRun> {
        let state = self.state.read().await;
        state.runs.iter().map(|run| state.run_view(run)).collect()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_country(&self, iso3: &str) -> StoreResult<Option<Country>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .countries
            .iter()
            .find(|c| c.iso3_code.eq_ignore_ascii_case(iso3))
            .cloned())
    }

    async fn insert_country(&self, country: &NewCountry) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.countries.iter().any(|c| {
            c.iso3_code == country.iso3_code || c.iso2_code == country.iso2_code
        }) {
            return Ok(false);
        }
        let id = next_id(state.countries.len())?;
        state.countries.push(Country {
            id,
            iso3_code: country.iso3_code.clone(),
            iso2_code: country.iso2_code.clone(),
            name: country.name.clone(),
            region: country.region.clone(),
            subregion: country.subregion.clone(),
            income_level: country.income_level.clone(),
        });
        Ok(true)
    }

    async fn find_source(&self, code: &str) -> StoreResult<Option<Source>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.sources.iter().find(|s| s.code == code).cloned())
    }

    async fn insert_source(&self, source: &SourceDescriptor) -> StoreResult<Option<SourceId>> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.sources.iter().any(|s| s.code == source.code) {
            return Ok(None);
        }
        let id = next_id(state.sources.len())?;
        state.sources.push(Source {
            id,
            code: source.code.clone(),
            name: source.name.clone(),
            base_url: source.base_url.clone(),
            description: source.description.clone(),
            last_updated: None,
        });
        Ok(Some(id))
    }

    async fn touch_source(&self, source_id: SourceId, at: DateTime<Utc>) -> StoreResult<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if let Some(source) = state.sources.iter_mut().find(|s| s.id == source_id) {
            source.last_updated = Some(at);
        }
        Ok(())
    }

    async fn find_category(&self, code: &str) -> StoreResult<Option<Category>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.categories.iter().find(|c| c.code == code).cloned())
    }

    async fn insert_category(&self, category: &NewCategory) -> StoreResult<Option<CategoryId>> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.categories.iter().any(|c| c.code == category.code) {
            return Ok(None);
        }
        if let Some(parent_id) = category.parent_id {
            if !state.categories.iter().any(|c| c.id == parent_id) {
                return Err(StoreError::Integrity(format!(
                    "category parent {parent_id} does not exist"
                )));
            }
        }
        let id = next_id(state.categories.len())?;
        state.categories.push(Category {
            id,
            code: category.code.clone(),
            name: category.name.clone(),
            parent_id: category.parent_id,
            description: category.description.clone(),
        });
        Ok(Some(id))
    }

    async fn find_indicator(&self, source_id: SourceId, code: &str) -> StoreResult<Option<Indicator>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .indicators
            .iter()
            .find(|i| i.source_id == source_id && i.code == code)
            .cloned())
    }

    async fn insert_indicator(&self, indicator: &NewIndicator) -> StoreResult<Option<IndicatorId>> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state
            .indicators
            .iter()
            .any(|i| i.source_id == indicator.source_id && i.code == indicator.code)
        {
            return Ok(None);
        }
        if !state.sources.iter().any(|s| s.id == indicator.source_id) {
            return Err(StoreError::Integrity(format!(
                "indicator source {} does not exist",
                indicator.source_id
            )));
        }
        let id = next_id(state.indicators.len())?;
        state.indicators.push(Indicator {
            id,
            source_id: indicator.source_id,
            category_id: indicator.category_id,
            code: indicator.code.clone(),
            name: indicator.name.clone(),
            description: indicator.description.clone(),
            unit: indicator.unit.clone(),
            frequency: indicator.frequency.clone(),
        });
        Ok(Some(id))
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn upsert_observation(
        &self,
        partition: Partition,
        draft: &ObservationDraft,
        fetched_at: DateTime<Utc>,
    ) -> StoreResult<UpsertOutcome> {
        self.check_available()?;
        self.take_upsert_budget()?;

        if !partition.contains(draft.year) {
            return Err(StoreError::Integrity(format!(
                "year {} violates partition constraint of {partition}",
                draft.year
            )));
        }

        let mut state = self.state.write().await;
        if !state.countries.iter().any(|c| c.id == draft.country_id) {
            return Err(StoreError::Integrity(format!("country {} does not exist", draft.country_id)));
        }
        if !state.indicators.iter().any(|i| i.id == draft.indicator_id) {
            return Err(StoreError::Integrity(format!(
                "indicator {} does not exist",
                draft.indicator_id
            )));
        }

        let row = StoredObservation {
            value: draft.value,
            is_estimated: draft.is_estimated,
            source_note: draft.source_note.clone(),
            fetched_at,
        };
        let previous = state
            .observations
            .entry(partition)
            .or_default()
            .insert(draft.key(), row);

        Ok(match previous {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        })
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn insert_run(&self, source_id: SourceId, started_at: DateTime<Utc>) -> StoreResult<RunId> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if !state.sources.iter().any(|s| s.id == source_id) {
            return Err(StoreError::Integrity(format!("source {source_id} does not exist")));
        }
        let id = RunId::from(next_id(state.runs.len())?);
        state.runs.push(StoredRun {
            id,
            source_id,
            started_at,
            completed_at: None,
            status: RunStatus::Running,
            records_processed: 0,
            error_message: None,
        });
        Ok(id)
    }

    async fn finalize_run(&self, run_id: RunId, finalization: &RunFinalization) -> StoreResult<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        match state
            .runs
            .iter_mut()
            .find(|r| r.id == run_id && r.status == RunStatus::Running)
        {
            Some(run) => {
                run.status = finalization.status;
                run.records_processed = finalization.records_processed;
                run.error_message = finalization.error_message.clone();
                run.completed_at = Some(finalization.completed_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_run(&self, run_id: RunId) -> StoreResult<Option<IngestionRun>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .runs
            .iter()
            .find(|r| r.id == run_id)
            .map(|run| state.run_view(run)))
    }

    async fn list_runs(&self, filter: &RunFilter) -> StoreResult<Vec<IngestionRun>> {
        self.check_available()?;
        let state = self.state.read().await;
        let limit = usize::try_from(filter.effective_limit()).unwrap_or(usize::MAX);
        let mut runs: Vec<_> = state
            .runs
            .iter()
            .map(|run| state.run_view(run))
            .filter(|run| {
                filter
                    .source_code
                    .as_deref()
                    .map_or(true, |code| run.source_code.eq_ignore_ascii_case(code))
            })
            .filter(|run| filter.status.map_or(true, |status| run.status == status))
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn running_runs_started_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<IngestionRun>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .runs
            .iter()
            .filter(|r| r.status == RunStatus::Running && r.started_at < cutoff)
            .map(|run| state.run_view(run))
            .collect())
    }
}

struct MemoryLock {
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl HeldLock for MemoryLock {
    async fn release(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SourceLocks for MemoryStore {
    async fn lock_source(&self, source_code: &str) -> StoreResult<SourceLock> {
        self.check_available()?;
        let mutex = {
            let mut locks = self.locks.lock().await;
            locks.entry(source_code.to_string()).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        Ok(SourceLock::new(source_code, Box::new(MemoryLock { _guard: guard })))
    }
}

#[async_trait]
impl ReadStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }

    async fn query_observations(&self, query: &ObservationQuery) -> StoreResult<Vec<ObservationView>> {
        self.check_available()?;
        let state = self.state.read().await;

        let Some(country) = state
            .countries
            .iter()
            .find(|c| c.iso3_code.eq_ignore_ascii_case(&query.country))
        else {
            return Ok(Vec::new());
        };

        let indicators: HashMap<IndicatorId, (String, String)> = state
            .indicators
            .iter()
            .filter(|i| i.code == query.indicator)
            .map(|i| (i.id, (state.source_code(i.source_id), i.code.clone())))
            .filter(|(_, (source, _))| {
                query
                    .source
                    .as_deref()
                    .map_or(true, |wanted| source.eq_ignore_ascii_case(wanted))
            })
            .collect();

        let mut rows: Vec<ObservationView> = state
            .observations
            .values()
            .flat_map(|rows| rows.iter())
            .filter(|(key, _)| key.country_id == country.id)
            .filter(|(key, _)| query.start_year.map_or(true, |start| key.year >= start))
            .filter(|(key, _)| query.end_year.map_or(true, |end| key.year <= end))
            .filter_map(|(key, row)| {
                indicators
                    .get(&key.indicator_id)
                    .map(|(source_code, indicator_code)| ObservationView {
                        country_iso3: country.iso3_code.clone(),
                        source_code: source_code.clone(),
                        indicator_code: indicator_code.clone(),
                        year: key.year,
                        value: row.value,
                        is_estimated: row.is_estimated,
                        source_note: row.source_note.clone(),
                        fetched_at: row.fetched_at,
                    })
            })
            .collect();
        rows.sort_by(|a, b| a.source_code.cmp(&b.source_code).then(a.year.cmp(&b.year)));
        Ok(rows)
    }

    async fn list_countries(&self, region: Option<&str>) -> StoreResult<Vec<Country>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut countries: Vec<_> = state
            .countries
            .iter()
            .filter(|c| region.map_or(true, |r| c.region.eq_ignore_ascii_case(r)))
            .cloned()
            .collect();
        countries.sort_by(|a, b| a.iso3_code.cmp(&b.iso3_code));
        Ok(countries)
    }

    async fn list_sources(&self) -> StoreResult<Vec<Source>> {
        self.check_available()?;
        let mut sources = self.state.read().await.sources.clone();
        sources.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(sources)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        self.check_available()?;
        let mut categories = self.state.read().await.categories.clone();
        categories.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(categories)
    }

    async fn list_indicators(&self, filter: &IndicatorFilter) -> StoreResult<(Vec<IndicatorView>, i64)> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut matching: Vec<IndicatorView> = state
            .indicators
            .iter()
            .map(|i| state.indicator_view(i))
            .filter(|view| {
                filter
                    .source
                    .as_deref()
                    .map_or(true, |s| view.source_code.eq_ignore_ascii_case(s))
            })
            .filter(|view| {
                filter.category.as_deref().map_or(true, |c| {
                    view.category_code
                        .as_deref()
                        .is_some_and(|code| code.eq_ignore_ascii_case(c))
                })
            })
            .collect();
        matching.sort_by(|a, b| a.source_code.cmp(&b.source_code).then(a.code.cmp(&b.code)));

        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(filter.offset.max(0)).unwrap_or(0);
        let limit = usize::try_from(filter.limit.max(0)).unwrap_or(0);
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn catalog_stats(&self) -> StoreResult<CatalogStats> {
        self.check_available()?;
        let state = self.state.read().await;
        let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        let observations: usize = state.observations.values().map(BTreeMap::len).sum();
        Ok(CatalogStats {
            countries: count(state.countries.len()),
            sources: count(state.sources.len()),
            categories: count(state.categories.len()),
            indicators: count(state.indicators.len()),
            observations: count(observations),
            runs: count(state.runs.len()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ingest::partition::route;
    use std::time::Duration;

    fn draft(country_id: i32, indicator_id: i32, year: i32, value: f64) -> ObservationDraft {
        ObservationDraft {
            country_id,
            indicator_id,
            year,
            value: Some(value),
            is_estimated: false,
            source_note: None,
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_country(&crate::catalog::reference::COUNTRIES[0].to_new_country())
            .await
            .unwrap();
        let source_id = store
            .insert_source(&SourceDescriptor::bare("WB"))
            .await
            .unwrap()
            .unwrap();
        store
            .insert_indicator(&NewIndicator {
                source_id,
                category_id: None,
                code: "GDP".to_string(),
                name: "GDP".to_string(),
                description: None,
                unit: None,
                frequency: "annual".to_string(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_duplicate_catalog_inserts_return_none() {
        let store = MemoryStore::new();
        let wb = SourceDescriptor::bare("WB");
        assert!(store.insert_source(&wb).await.unwrap().is_some());
        assert!(store.insert_source(&wb).await.unwrap().is_none());

        let country = crate::catalog::reference::COUNTRIES[0].to_new_country();
        assert!(store.insert_country(&country).await.unwrap());
        assert!(!store.insert_country(&country).await.unwrap());
    }

    #[tokio::test]
    async fn test_category_parent_must_exist() {
        let store = MemoryStore::new();
        let orphan = NewCategory {
            code: "ENERGY".to_string(),
            name: "Energy".to_string(),
            parent_id: Some(7),
            description: None,
        };
        assert!(matches!(
            store.insert_category(&orphan).await,
            Err(StoreError::Integrity(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_reports_insert_then_update() {
        let store = seeded().await;
        let partition = route(2020).unwrap();

        let first = store
            .upsert_observation(partition, &draft(1, 1, 2020, 1.0), Utc::now())
            .await
            .unwrap();
        let second = store
            .upsert_observation(partition, &draft(1, 1, 2020, 2.0), Utc::now())
            .await
            .unwrap();

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Updated);
        assert_eq!(store.partition_keys(partition).await.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_enforces_references_and_partition() {
        let store = seeded().await;
        let partition = route(2020).unwrap();

        let missing_country = store
            .upsert_observation(partition, &draft(99, 1, 2020, 1.0), Utc::now())
            .await;
        assert!(matches!(missing_country, Err(StoreError::Integrity(_))));

        let wrong_partition = store
            .upsert_observation(route(1990).unwrap(), &draft(1, 1, 2020, 1.0), Utc::now())
            .await;
        assert!(matches!(wrong_partition, Err(StoreError::Integrity(_))));
    }

    #[tokio::test]
    async fn test_upsert_budget_then_unavailable() {
        let store = seeded().await;
        store.fail_upserts_after(1);
        let partition = route(2020).unwrap();

        assert!(store
            .upsert_observation(partition, &draft(1, 1, 2020, 1.0), Utc::now())
            .await
            .is_ok());
        assert!(matches!(
            store
                .upsert_observation(partition, &draft(1, 1, 2021, 1.0), Utc::now())
                .await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_switch() {
        let store = seeded().await;
        store.set_unavailable(true);
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_source_lock_is_exclusive() {
        let store = Arc::new(MemoryStore::new());
        let held = store.lock_source("WB").await.unwrap();

        let contender = {
            let store = store.clone();
            tokio::spawn(async move { store.lock_source("WB").await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // other sources are unaffected
        let other = store.lock_source("IMF").await.unwrap();
        other.release().await.unwrap();

        held.release().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_indicators_pages_and_counts() {
        let store = seeded().await;
        let (page, total) = store
            .list_indicators(&IndicatorFilter {
                source: Some("wb".to_string()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].source_code, "WB");

        let (page, total) = store
            .list_indicators(&IndicatorFilter {
                category: Some("ECONOMIC".to_string()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 0);
        assert!(page.is_empty());
    }
}
