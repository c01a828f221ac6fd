//! HTTP API handlers for apo-engine

pub mod apo;
pub mod health;

pub use apo::apo_routes;
pub use health::health_routes;
