//! Reference data seeding
//!
//! Idempotent: rows that already exist are left untouched, so the seed can
//! run on every server start.

use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::store::{CatalogStore, StoreError, StoreResult};

use super::{reference, CategoryId, NewCategory};

/// Rows created by one seeding pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub countries_added: usize,
    pub sources_added: usize,
    pub categories_added: usize,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        self.countries_added == 0 && self.sources_added == 0 && self.categories_added == 0
    }
}

/// Insert the reference countries, sources and categories
#[tracing::instrument(skip(store))]
pub async fn seed_reference_data(store: &dyn CatalogStore) -> StoreResult<SeedReport> {
    let mut report = SeedReport::default();

    for country in reference::COUNTRIES {
        if store.insert_country(&country.to_new_country()).await? {
            report.countries_added += 1;
        }
    }

    for source in reference::sources() {
        if store.insert_source(&source).await?.is_some() {
            report.sources_added += 1;
        }
    }

    let mut ids: HashMap<String, CategoryId> = HashMap::new();
    for (category, parent_code) in reference::categories() {
        let parent_id = match parent_code {
            Some(parent) => Some(category_id(store, &ids, parent).await?),
            None => None,
        };
        let category = NewCategory {
            parent_id,
            ..category
        };
        let id = match store.insert_category(&category).await? {
            Some(id) => {
                report.categories_added += 1;
                id
            }
            None => category_id(store, &ids, &category.code).await?,
        };
        ids.insert(category.code, id);
    }

    info!(
        countries = report.countries_added,
        sources = report.sources_added,
        categories = report.categories_added,
        "Reference data seeded"
    );
    Ok(report)
}

async fn category_id(
    store: &dyn CatalogStore,
    seen: &HashMap<String, CategoryId>,
    code: &str,
) -> StoreResult<CategoryId> {
    if let Some(id) = seen.get(code) {
        return Ok(*id);
    }
    store
        .find_category(code)
        .await?
        .map(|c| c.id)
        .ok_or_else(|| StoreError::Integrity(format!("category '{code}' missing after seeding")))
}
