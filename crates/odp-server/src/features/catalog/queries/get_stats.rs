//! Row counts across the catalog, observations and run history

use crate::features::FeatureState;
use crate::store::{CatalogStats, StoreError};

pub async fn handle(state: FeatureState) -> Result<CatalogStats, StoreError> {
    state.read.catalog_stats().await
}
