pub mod queries;
pub mod routes;

pub use routes::observations_routes;
