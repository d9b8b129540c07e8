pub mod queries;
pub mod routes;

pub use routes::runs_routes;
