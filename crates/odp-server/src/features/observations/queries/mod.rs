pub mod get_observations;

pub use get_observations::{GetObservationsError, GetObservationsQuery, GetObservationsResponse};
