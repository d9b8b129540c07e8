//! Catalog resolution
//!
//! Maps external codes to internal ids, creating sources, categories and
//! indicators on first sight. Every create is a read-or-create guarded by the
//! store's uniqueness constraints: if a concurrent writer wins the insert, the
//! loser re-reads and returns the winner's id. Resolved ids are cached per
//! process; catalog rows are never deleted, so cached ids stay valid.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::ingest::types::SkipReason;
use crate::store::{CatalogStore, StoreError};

use super::{
    truncate_chars, CategoryId, CountryId, IndicatorId, IndicatorMetadata, NewCategory,
    NewIndicator, SourceDescriptor, SourceId, DEFAULT_FREQUENCY, INDICATOR_NAME_MAX_LEN,
};

/// Ids for one observation's catalog references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIds {
    pub country_id: CountryId,
    pub indicator_id: IndicatorId,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown country: {0}")]
    UnknownCountry(String),

    #[error("unknown parent category '{parent}' for category '{category}'")]
    UnknownParentCategory { category: String, parent: String },

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResolveError {
    /// Record-level failures become skips; anything else is returned as is
    pub fn into_skip(self) -> Result<SkipReason, ResolveError> {
        match self {
            ResolveError::UnknownCountry(code) => Ok(SkipReason::UnknownCountry(code)),
            ResolveError::UnknownParentCategory { category, parent } => {
                Ok(SkipReason::UnknownParentCategory { category, parent })
            }
            other => Err(other),
        }
    }
}

fn lost_race(kind: &str, code: &str) -> StoreError {
    StoreError::Integrity(format!("{kind} '{code}' rejected as duplicate but not readable"))
}

#[derive(Default)]
struct Caches {
    countries: HashMap<String, CountryId>,
    sources: HashMap<String, SourceId>,
    categories: HashMap<String, CategoryId>,
    indicators: HashMap<(SourceId, String), IndicatorId>,
}

pub struct CatalogResolver {
    store: Arc<dyn CatalogStore>,
    caches: RwLock<Caches>,
}

impl CatalogResolver {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            caches: RwLock::new(Caches::default()),
        }
    }

    /// Resolve the country and indicator of one normalized record
    ///
    /// The source must already be registered. Countries are never created
    /// here. A missing indicator is created from `metadata`, falling back to
    /// the code as its name.
    #[tracing::instrument(skip(self, metadata), level = "debug")]
    pub async fn resolve(
        &self,
        source_code: &str,
        indicator_code: &str,
        country_iso3: &str,
        metadata: Option<&IndicatorMetadata>,
    ) -> Result<ResolvedIds, ResolveError> {
        let country_id = self.country_id(country_iso3).await?;
        let source_id = self.resolve_source(source_code).await?;
        let indicator_id = self.indicator_id(source_id, indicator_code, metadata).await?;
        Ok(ResolvedIds {
            country_id,
            indicator_id,
        })
    }

    /// Id of an already registered source
    pub async fn resolve_source(&self, code: &str) -> Result<SourceId, ResolveError> {
        let code = code.trim().to_uppercase();
        if let Some(id) = self.caches.read().await.sources.get(&code) {
            return Ok(*id);
        }
        let source = self
            .store
            .find_source(&code)
            .await?
            .ok_or_else(|| ResolveError::UnknownSource(code.clone()))?;
        self.caches.write().await.sources.insert(code, source.id);
        Ok(source.id)
    }

    /// Register a source if needed and return its id
    #[tracing::instrument(skip(self, descriptor), fields(source = %descriptor.code))]
    pub async fn ensure_source(&self, descriptor: &SourceDescriptor) -> Result<SourceId, ResolveError> {
        let code = descriptor.code.trim().to_uppercase();
        if let Some(id) = self.caches.read().await.sources.get(&code) {
            return Ok(*id);
        }

        let id = match self.store.find_source(&code).await? {
            Some(source) => source.id,
            None => {
                let descriptor = SourceDescriptor {
                    code: code.clone(),
                    ..descriptor.clone()
                };
                match self.store.insert_source(&descriptor).await? {
                    Some(id) => {
                        info!(source = %code, id, "Registered source");
                        id
                    }
                    None => self
                        .store
                        .find_source(&code)
                        .await?
                        .map(|s| s.id)
                        .ok_or_else(|| lost_race("source", &code))?,
                }
            }
        };

        self.caches.write().await.sources.insert(code, id);
        Ok(id)
    }

    async fn country_id(&self, iso3: &str) -> Result<CountryId, ResolveError> {
        if let Some(id) = self.caches.read().await.countries.get(iso3) {
            return Ok(*id);
        }
        let country = self
            .store
            .find_country(iso3)
            .await?
            .ok_or_else(|| ResolveError::UnknownCountry(iso3.to_string()))?;
        self.caches
            .write()
            .await
            .countries
            .insert(iso3.to_string(), country.id);
        Ok(country.id)
    }

    async fn indicator_id(
        &self,
        source_id: SourceId,
        code: &str,
        metadata: Option<&IndicatorMetadata>,
    ) -> Result<IndicatorId, ResolveError> {
        let cache_key = (source_id, code.to_string());
        if let Some(id) = self.caches.read().await.indicators.get(&cache_key) {
            return Ok(*id);
        }

        let id = match self.store.find_indicator(source_id, code).await? {
            Some(indicator) => indicator.id,
            None => self.create_indicator(source_id, code, metadata).await?,
        };

        self.caches.write().await.indicators.insert(cache_key, id);
        Ok(id)
    }

    async fn create_indicator(
        &self,
        source_id: SourceId,
        code: &str,
        metadata: Option<&IndicatorMetadata>,
    ) -> Result<IndicatorId, ResolveError> {
        let category_id = match metadata.and_then(|m| m.category_code.as_deref()) {
            Some(category_code) => Some(self.category_id(category_code, metadata).await?),
            None => None,
        };

        let name = metadata
            .and_then(|m| m.name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(code);

        let indicator = NewIndicator {
            source_id,
            category_id,
            code: code.to_string(),
            name: truncate_chars(name, INDICATOR_NAME_MAX_LEN),
            description: metadata.and_then(|m| m.description.clone()),
            unit: metadata.and_then(|m| m.unit.clone()),
            frequency: metadata
                .and_then(|m| m.frequency.as_deref())
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .unwrap_or(DEFAULT_FREQUENCY)
                .to_string(),
        };

        match self.store.insert_indicator(&indicator).await? {
            Some(id) => {
                info!(source_id, indicator = %code, id, "Registered indicator");
                Ok(id)
            }
            None => {
                debug!(source_id, indicator = %code, "Indicator created concurrently, re-reading");
                self.store
                    .find_indicator(source_id, code)
                    .await?
                    .map(|i| i.id)
                    .ok_or_else(|| lost_race("indicator", code).into())
            }
        }
    }

    async fn category_id(
        &self,
        code: &str,
        metadata: Option<&IndicatorMetadata>,
    ) -> Result<CategoryId, ResolveError> {
        let code = code.trim().to_uppercase();
        if let Some(id) = self.caches.read().await.categories.get(&code) {
            return Ok(*id);
        }

        let id = match self.store.find_category(&code).await? {
            Some(category) => category.id,
            None => self.create_category(&code, metadata).await?,
        };

        self.caches.write().await.categories.insert(code, id);
        Ok(id)
    }

    async fn create_category(
        &self,
        code: &str,
        metadata: Option<&IndicatorMetadata>,
    ) -> Result<CategoryId, ResolveError> {
        // parents are never created implicitly
        let parent_id = match metadata.and_then(|m| m.parent_category_code.as_deref()) {
            Some(parent) => {
                let parent = parent.trim().to_uppercase();
                let found = self.store.find_category(&parent).await?.ok_or_else(|| {
                    ResolveError::UnknownParentCategory {
                        category: code.to_string(),
                        parent: parent.clone(),
                    }
                })?;
                Some(found.id)
            }
            None => None,
        };

        let category = NewCategory {
            code: code.to_string(),
            name: metadata
                .and_then(|m| m.category_name.clone())
                .unwrap_or_else(|| code.to_string()),
            parent_id,
            description: None,
        };

        match self.store.insert_category(&category).await? {
            Some(id) => {
                info!(category = %code, id, "Registered category");
                Ok(id)
            }
            None => self
                .store
                .find_category(code)
                .await?
                .map(|c| c.id)
                .ok_or_else(|| lost_race("category", code).into()),
        }
    }
}
