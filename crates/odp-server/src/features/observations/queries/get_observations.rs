//! Point and range queries over observations
//!
//! `year` selects a single year; `start_year`/`end_year` select an inclusive
//! range, either end optional. The two forms cannot be combined.

use serde::{Deserialize, Serialize};

use crate::features::FeatureState;
use crate::store::{ObservationQuery, ObservationView, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetObservationsQuery {
    /// ISO3 country code
    pub country: Option<String>,
    /// External indicator code
    pub indicator: Option<String>,
    /// Restrict to one source; omitted means every source that reports the indicator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetObservationsResponse {
    pub country: String,
    pub indicator: String,
    pub observations: Vec<ObservationView>,
}

#[derive(Debug, thiserror::Error)]
pub enum GetObservationsError {
    #[error("country is required")]
    CountryRequired,

    #[error("indicator is required")]
    IndicatorRequired,

    #[error("year cannot be combined with start_year or end_year")]
    ConflictingYears,

    #[error("start_year {start} is after end_year {end}")]
    InvertedRange { start: i32, end: i32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn required(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl GetObservationsQuery {
    pub fn validate(&self) -> Result<ObservationQuery, GetObservationsError> {
        let country = required(&self.country)
            .ok_or(GetObservationsError::CountryRequired)?
            .to_uppercase();
        let indicator =
            required(&self.indicator).ok_or(GetObservationsError::IndicatorRequired)?;

        let (start_year, end_year) = match (self.year, self.start_year, self.end_year) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(GetObservationsError::ConflictingYears)
            }
            (Some(year), None, None) => (Some(year), Some(year)),
            (None, Some(start), Some(end)) if start > end => {
                return Err(GetObservationsError::InvertedRange { start, end })
            }
            (None, start, end) => (start, end),
        };

        Ok(ObservationQuery {
            country,
            indicator,
            source: required(&self.source).map(|code| code.to_uppercase()),
            start_year,
            end_year,
        })
    }
}

#[tracing::instrument(skip(state))]
pub async fn handle(
    state: FeatureState,
    query: GetObservationsQuery,
) -> Result<GetObservationsResponse, GetObservationsError> {
    let query = query.validate()?;
    let observations = state.read.query_observations(&query).await?;

    tracing::debug!(count = observations.len(), "Observations queried");

    Ok(GetObservationsResponse {
        country: query.country,
        indicator: query.indicator,
        observations,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base() -> GetObservationsQuery {
        GetObservationsQuery {
            country: Some("usa".to_string()),
            indicator: Some("NY.GDP.MKTP.CD".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_point_query_becomes_single_year_range() {
        let query = GetObservationsQuery {
            year: Some(2020),
            source: Some("wb".to_string()),
            ..base()
        }
        .validate()
        .unwrap();

        assert_eq!(query.country, "USA");
        assert_eq!(query.source.as_deref(), Some("WB"));
        assert_eq!((query.start_year, query.end_year), (Some(2020), Some(2020)));
    }

    #[test]
    fn test_open_ended_range_is_allowed() {
        let query = GetObservationsQuery {
            start_year: Some(2000),
            ..base()
        }
        .validate()
        .unwrap();

        assert_eq!((query.start_year, query.end_year), (Some(2000), None));
    }

    #[test]
    fn test_invalid_queries_are_rejected() {
        let missing = GetObservationsQuery {
            country: Some(" ".to_string()),
            ..base()
        };
        assert!(matches!(missing.validate(), Err(GetObservationsError::CountryRequired)));

        let conflicting = GetObservationsQuery {
            year: Some(2000),
            end_year: Some(2005),
            ..base()
        };
        assert!(matches!(conflicting.validate(), Err(GetObservationsError::ConflictingYears)));

        let inverted = GetObservationsQuery {
            start_year: Some(2010),
            end_year: Some(2000),
            ..base()
        };
        assert!(matches!(
            inverted.validate(),
            Err(GetObservationsError::InvertedRange { start: 2010, end: 2000 })
        ));
    }
}
