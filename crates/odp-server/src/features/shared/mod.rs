//! Shared utilities for feature modules

pub mod errors;
pub mod pagination;

pub use errors::store_failure;
pub use pagination::{Paginated, PaginationMetadata, PaginationParams};
