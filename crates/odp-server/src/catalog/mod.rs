//! Reference catalog
//!
//! Countries, sources, categories and indicators give meaning to raw
//! observations. Countries are a closed, seeded list. Sources and categories
//! are seeded at bootstrap and may also be registered on first sight.
//! Indicators are only ever created by the [`CatalogResolver`] when a provider
//! reports a code that has not been seen before.
//!
//! Catalog rows are never deleted, so an id handed out once stays valid for
//! the lifetime of the database.

pub mod bootstrap;
pub mod reference;
pub mod resolver;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use resolver::{CatalogResolver, ResolveError, ResolvedIds};

pub type CountryId = i32;
pub type SourceId = i32;
pub type CategoryId = i32;
pub type IndicatorId = i32;

/// Maximum stored length of an indicator name
pub const INDICATOR_NAME_MAX_LEN: usize = 255;

/// Frequency assumed when a provider does not report one
pub const DEFAULT_FREQUENCY: &str = "annual";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Country {
    pub id: CountryId,
    pub iso3_code: String,
    pub iso2_code: String,
    pub name: String,
    pub region: String,
    pub subregion: Option<String>,
    pub income_level: Option<String>,
}

/// A country as it is inserted at bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCountry {
    pub iso3_code: String,
    pub iso2_code: String,
    pub name: String,
    pub region: String,
    pub subregion: Option<String>,
    pub income_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Source {
    pub id: SourceId,
    pub code: String,
    pub name: String,
    pub base_url: Option<String>,
    pub description: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Static description of a provider, used to register it on first ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub code: String,
    pub name: String,
    pub base_url: Option<String>,
    pub description: Option<String>,
}

impl SourceDescriptor {
    /// Descriptor for a provider that only has a code
    pub fn bare(code: &str) -> Self {
        Self {
            code: code.to_uppercase(),
            name: code.to_uppercase(),
            base_url: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub code: String,
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub code: String,
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Indicator {
    pub id: IndicatorId,
    pub source_id: SourceId,
    pub category_id: Option<CategoryId>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub frequency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIndicator {
    pub source_id: SourceId,
    pub category_id: Option<CategoryId>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub frequency: String,
}

/// Descriptive fields a provider may attach to a record
///
/// Only consulted when the indicator (or its category) does not exist yet;
/// an existing indicator is never rewritten from record metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub category_code: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub parent_category_code: Option<String>,
}

/// Truncate to at most `max` characters without splitting a code point
pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
