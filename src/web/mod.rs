//! HTTP serving layer for the cached weather record.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod status;
pub mod weather;

pub use routes::*;
