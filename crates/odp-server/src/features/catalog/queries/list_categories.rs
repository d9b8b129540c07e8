//! List indicator categories
//!
//! Categories form a tree through `parent_id`; the list is flat and the
//! client rebuilds the hierarchy.

use crate::catalog::Category;
use crate::features::FeatureState;
use crate::store::StoreError;

pub async fn handle(state: FeatureState) -> Result<Vec<Category>, StoreError> {
    state.read.list_categories().await
}
