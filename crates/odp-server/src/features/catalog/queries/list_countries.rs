//! List reference countries, optionally by region

use serde::{Deserialize, Serialize};

use crate::catalog::Country;
use crate::features::FeatureState;
use crate::store::StoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCountriesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

pub async fn handle(state: FeatureState, query: ListCountriesQuery) -> Result<Vec<Country>, StoreError> {
    let region = query
        .region
        .as_deref()
        .map(str::trim)
        .filter(|region| !region.is_empty());
    state.read.list_countries(region).await
}
