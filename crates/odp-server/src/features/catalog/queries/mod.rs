//! Catalog queries

pub mod get_stats;
pub mod list_categories;
pub mod list_countries;
pub mod list_indicators;
pub mod list_sources;

pub use list_countries::ListCountriesQuery;
pub use list_indicators::{ListIndicatorsError, ListIndicatorsQuery};
