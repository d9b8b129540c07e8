//! Paginated indicator listing
//!
//! Filters combine: `source` and `category` are both exact codes.

use serde::{Deserialize, Serialize};

use crate::features::shared::{Paginated, PaginationMetadata, PaginationParams};
use crate::features::FeatureState;
use crate::store::{IndicatorFilter, IndicatorView, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListIndicatorsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListIndicatorsError {
    #[error("{0}")]
    InvalidPagination(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn code(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
}

impl ListIndicatorsQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }

    pub fn to_filter(&self) -> Result<IndicatorFilter, ListIndicatorsError> {
        let pagination = self.pagination();
        pagination
            .validate()
            .map_err(ListIndicatorsError::InvalidPagination)?;

        Ok(IndicatorFilter {
            source: code(&self.source),
            category: code(&self.category),
            limit: pagination.per_page(),
            offset: pagination.offset(),
        })
    }
}

pub async fn handle(
    state: FeatureState,
    query: ListIndicatorsQuery,
) -> Result<Paginated<IndicatorView>, ListIndicatorsError> {
    let filter = query.to_filter()?;
    let (items, total) = state.read.list_indicators(&filter).await?;
    Ok(Paginated::new(
        items,
        PaginationMetadata::from_params(&query.pagination(), total),
    ))
}
