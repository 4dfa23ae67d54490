//! Application layer: gateway traits and the service-wide error type.

pub mod error;
pub mod repos;
