pub mod queries;
pub mod routes;

pub use routes::catalog_routes;
