//! PostgreSQL store
//!
//! Catalog inserts use `ON CONFLICT DO NOTHING RETURNING id` so a lost race
//! surfaces as `Ok(None)` instead of an error. Observations are written
//! straight into the partition table chosen by the router, which makes the
//! partition's range constraint the last line of defence for a bad route.
//! Per-source locks are session-level advisory locks held on a dedicated
//! pooled connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tracing::{debug, warn};

use crate::catalog::{
    Category, CategoryId, Country, Indicator, IndicatorId, NewCategory, NewCountry, NewIndicator,
    Source, SourceDescriptor, SourceId,
};
use crate::ingest::partition::Partition;
use crate::ingest::runs::{IngestionRun, RunFilter, RunFinalization, RunId, RunStatus};
use crate::ingest::types::{ObservationDraft, UpsertOutcome};

use super::{
    CatalogStats, CatalogStore, HeldLock, IndicatorFilter, IndicatorView, ObservationQuery,
    ObservationStore, ObservationView, ReadStore, RunStore, SourceLock, SourceLocks, StoreError,
    StoreResult,
};

const COUNTRY_COLUMNS: &str =
    "id, iso3_code, iso2_code, name, region, subregion, income_level";

const SOURCE_COLUMNS: &str = "id, code, name, base_url, description, last_updated";

const CATEGORY_COLUMNS: &str = "id, code, name, parent_id, description";

const INDICATOR_COLUMNS: &str =
    "id, source_id, category_id, code, name, description, unit, frequency";

const RUN_SELECT: &str = r#"
    SELECT l.id, l.source_id, s.code AS source_code, l.started_at, l.completed_at,
           l.status, l.records_processed, l.error_message
    FROM ingestion_logs l
    JOIN sources s ON s.id = l.source_id
"#;

/// Map driver errors onto the store's failure classes
fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() || db.is_check_violation() => {
            StoreError::Integrity(db.message().to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_country(&self, iso3: &str) -> StoreResult<Option<Country>> {
        let sql = format!("SELECT {COUNTRY_COLUMNS} FROM countries WHERE iso3_code = upper($1)");
        sqlx::query_as::<_, Country>(&sql)
            .bind(iso3)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn insert_country(&self, country: &NewCountry) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO countries (iso3_code, iso2_code, name, region, subregion, income_level)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&country.iso3_code)
        .bind(&country.iso2_code)
        .bind(&country.name)
        .bind(&country.region)
        .bind(&country.subregion)
        .bind(&country.income_level)
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_source(&self, code: &str) -> StoreResult<Option<Source>> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE code = $1");
        sqlx::query_as::<_, Source>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn insert_source(&self, source: &SourceDescriptor) -> StoreResult<Option<SourceId>> {
        sqlx::query_scalar::<_, SourceId>(
            r#"
            INSERT INTO sources (code, name, base_url, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&source.code)
        .bind(&source.name)
        .bind(&source.base_url)
        .bind(&source.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn touch_source(&self, source_id: SourceId, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE sources SET last_updated = $2 WHERE id = $1")
            .bind(source_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn find_category(&self, code: &str) -> StoreResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE code = $1");
        sqlx::query_as::<_, Category>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn insert_category(&self, category: &NewCategory) -> StoreResult<Option<CategoryId>> {
        sqlx::query_scalar::<_, CategoryId>(
            r#"
            INSERT INTO categories (code, name, parent_id, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&category.code)
        .bind(&category.name)
        .bind(category.parent_id)
        .bind(&category.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn find_indicator(&self, source_id: SourceId, code: &str) -> StoreResult<Option<Indicator>> {
        let sql =
            format!("SELECT {INDICATOR_COLUMNS} FROM indicators WHERE source_id = $1 AND code = $2");
        sqlx::query_as::<_, Indicator>(&sql)
            .bind(source_id)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn insert_indicator(&self, indicator: &NewIndicator) -> StoreResult<Option<IndicatorId>> {
        sqlx::query_scalar::<_, IndicatorId>(
            r#"
            INSERT INTO indicators (source_id, category_id, code, name, description, unit, frequency)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_id, code) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(indicator.source_id)
        .bind(indicator.category_id)
        .bind(&indicator.code)
        .bind(&indicator.name)
        .bind(&indicator.description)
        .bind(&indicator.unit)
        .bind(&indicator.frequency)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }
}

#[async_trait]
impl ObservationStore for PgStore {
    async fn upsert_observation(
        &self,
        partition: Partition,
        draft: &ObservationDraft,
        fetched_at: DateTime<Utc>,
    ) -> StoreResult<UpsertOutcome> {
        // table name comes from the router, never from input
        let sql = format!(
            r#"
            INSERT INTO {table} (country_id, indicator_id, year, value, is_estimated, source_note, fetched_at)
            VALUES ($1, $2, $3, CAST($4 AS NUMERIC), $5, $6, $7)
            ON CONFLICT (country_id, indicator_id, year) DO UPDATE SET
                value = EXCLUDED.value,
                is_estimated = EXCLUDED.is_estimated,
                source_note = EXCLUDED.source_note,
                fetched_at = EXCLUDED.fetched_at
            RETURNING (xmax = 0) AS inserted
            "#,
            table = partition.table_name()
        );

        let inserted: bool = sqlx::query_scalar(&sql)
            .bind(draft.country_id)
            .bind(draft.indicator_id)
            .bind(draft.year)
            .bind(draft.value)
            .bind(draft.is_estimated)
            .bind(&draft.source_note)
            .bind(fetched_at)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        Ok(if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }
}

#[async_trait]
impl RunStore for PgStore {
    async fn insert_run(&self, source_id: SourceId, started_at: DateTime<Utc>) -> StoreResult<RunId> {
        sqlx::query_scalar::<_, RunId>(
            r#"
            INSERT INTO ingestion_logs (source_id, started_at, status)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(source_id)
        .bind(started_at)
        .bind(RunStatus::Running.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn finalize_run(&self, run_id: RunId, finalization: &RunFinalization) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ingestion_logs
            SET status = $2, records_processed = $3, error_message = $4, completed_at = $5
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(run_id)
        .bind(finalization.status.as_str())
        .bind(finalization.records_processed)
        .bind(&finalization.error_message)
        .bind(finalization.completed_at)
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_run(&self, run_id: RunId) -> StoreResult<Option<IngestionRun>> {
        let sql = format!("{RUN_SELECT} WHERE l.id = $1");
        sqlx::query_as::<_, IngestionRun>(&sql)
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn list_runs(&self, filter: &RunFilter) -> StoreResult<Vec<IngestionRun>> {
        let sql = format!(
            r#"{RUN_SELECT}
            WHERE ($1::text IS NULL OR s.code = upper($1))
              AND ($2::text IS NULL OR l.status = $2)
            ORDER BY l.started_at DESC, l.id DESC
            LIMIT $3"#
        );
        sqlx::query_as::<_, IngestionRun>(&sql)
            .bind(filter.source_code.as_deref())
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.effective_limit())
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn running_runs_started_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<IngestionRun>> {
        let sql = format!(
            "{RUN_SELECT} WHERE l.status = 'running' AND l.started_at < $1 ORDER BY l.started_at"
        );
        sqlx::query_as::<_, IngestionRun>(&sql)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }
}

/// Session advisory lock pinned to one pooled connection
struct PgHeldLock {
    source_code: String,
    conn: Option<PoolConnection<Postgres>>,
}

#[async_trait]
impl HeldLock for PgHeldLock {
    async fn release(mut self: Box<Self>) -> StoreResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock(hashtextextended($1, 0))")
            .bind(&self.source_code)
            .fetch_one(&mut *conn)
            .await
            .map_err(|err| {
                conn.close_on_drop();
                classify(err)
            })?;
        if !released {
            warn!(source = %self.source_code, "Advisory lock was not held at release");
        }
        debug!(source = %self.source_code, "Released source lock");
        Ok(())
    }
}

impl Drop for PgHeldLock {
    fn drop(&mut self) {
        // closing the session drops every advisory lock it held
        if let Some(conn) = self.conn.as_mut() {
            conn.close_on_drop();
        }
    }
}

impl PgHeldLock {
    /// Block until this session holds the advisory lock
    ///
    /// The guard owns the connection for the whole wait. If the wait is
    /// abandoned, dropping the guard closes the session, so a lock granted
    /// after cancellation never stays parked in the pool.
    async fn acquire(&mut self) -> StoreResult<()> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(StoreError::Unavailable(format!(
                "lock connection for {} already released",
                self.source_code
            )));
        };
        sqlx::query("SELECT pg_advisory_lock(hashtextextended($1, 0))")
            .bind(&self.source_code)
            .execute(&mut **conn)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl SourceLocks for PgStore {
    async fn lock_source(&self, source_code: &str) -> StoreResult<SourceLock> {
        let conn = self.pool.acquire().await.map_err(classify)?;
        let mut held = PgHeldLock {
            source_code: source_code.to_string(),
            conn: Some(conn),
        };
        held.acquire().await?;
        debug!(source = %source_code, "Acquired source lock");

        Ok(SourceLock::new(source_code, Box::new(held)))
    }
}

#[async_trait]
impl ReadStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn query_observations(&self, query: &ObservationQuery) -> StoreResult<Vec<ObservationView>> {
        sqlx::query_as::<_, ObservationView>(
            r#"
            SELECT c.iso3_code AS country_iso3,
                   s.code AS source_code,
                   i.code AS indicator_code,
                   o.year,
                   o.value::float8 AS value,
                   o.is_estimated,
                   o.source_note,
                   o.fetched_at
            FROM observations o
            JOIN countries c ON c.id = o.country_id
            JOIN indicators i ON i.id = o.indicator_id
            JOIN sources s ON s.id = i.source_id
            WHERE c.iso3_code = upper($1)
              AND i.code = $2
              AND ($3::text IS NULL OR s.code = upper($3))
              AND ($4::int IS NULL OR o.year >= $4)
              AND ($5::int IS NULL OR o.year <= $5)
            ORDER BY s.code, o.year
            "#,
        )
        .bind(&query.country)
        .bind(&query.indicator)
        .bind(query.source.as_deref())
        .bind(query.start_year)
        .bind(query.end_year)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }

    async fn list_countries(&self, region: Option<&str>) -> StoreResult<Vec<Country>> {
        let sql = format!(
            "SELECT {COUNTRY_COLUMNS} FROM countries \
             WHERE ($1::text IS NULL OR upper(region) = upper($1)) ORDER BY iso3_code"
        );
        sqlx::query_as::<_, Country>(&sql)
            .bind(region)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn list_sources(&self) -> StoreResult<Vec<Source>> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources ORDER BY code");
        sqlx::query_as::<_, Source>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY code");
        sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn list_indicators(&self, filter: &IndicatorFilter) -> StoreResult<(Vec<IndicatorView>, i64)> {
        const FILTER: &str = r#"
            FROM indicators i
            JOIN sources s ON s.id = i.source_id
            LEFT JOIN categories cat ON cat.id = i.category_id
            WHERE ($1::text IS NULL OR s.code = upper($1))
              AND ($2::text IS NULL OR cat.code = upper($2))
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {FILTER}"))
            .bind(filter.source.as_deref())
            .bind(filter.category.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;

        let sql = format!(
            r#"
            SELECT i.id, s.code AS source_code, cat.code AS category_code,
                   i.code, i.name, i.unit, i.frequency
            {FILTER}
            ORDER BY s.code, i.code
            LIMIT $3 OFFSET $4
            "#
        );
        let page = sqlx::query_as::<_, IndicatorView>(&sql)
            .bind(filter.source.as_deref())
            .bind(filter.category.as_deref())
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        Ok((page, total))
    }

    async fn catalog_stats(&self) -> StoreResult<CatalogStats> {
        let row: (i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM countries),
                   (SELECT COUNT(*) FROM sources),
                   (SELECT COUNT(*) FROM categories),
                   (SELECT COUNT(*) FROM indicators),
                   (SELECT COUNT(*) FROM observations),
                   (SELECT COUNT(*) FROM ingestion_logs)
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        Ok(CatalogStats {
            countries: row.0,
            sources: row.1,
            categories: row.2,
            indicators: row.3,
            observations: row.4,
            runs: row.5,
        })
    }
}
