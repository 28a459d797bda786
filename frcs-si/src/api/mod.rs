//! HTTP API handlers for frcs-si

pub mod health;
pub mod schema;
pub mod stats;
pub mod submit;

pub use health::health_routes;
pub use schema::get_schema;
pub use stats::get_stats;
pub use submit::submit;
