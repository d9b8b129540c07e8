//! Run history queries

pub mod get_run;
pub mod list_runs;
pub mod stale_runs;

pub use get_run::GetRunQuery;
pub use list_runs::{ListRunsError, ListRunsQuery, ListRunsResponse};
pub use stale_runs::{StaleRunsError, StaleRunsQuery, StaleRunsResponse};
