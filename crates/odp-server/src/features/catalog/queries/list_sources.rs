//! List data providers

use crate::catalog::Source;
use crate::features::FeatureState;
use crate::store::StoreError;

pub async fn handle(state: FeatureState) -> Result<Vec<Source>, StoreError> {
    state.read.list_sources().await
}
