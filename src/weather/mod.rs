//! Upstream weather data: the source trait, the OpenWeather client, and the
//! document model used to validate payloads.

pub mod client;
pub mod errors;
pub mod json;
pub mod models;

use crate::payload::Payload;
use async_trait::async_trait;

pub use client::OpenWeatherClient;
pub use errors::FetchError;

/// Something that can produce the current weather document on demand.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch the full current document. The body is read completely before
    /// returning, so no stream is left for the caller to close.
    async fn fetch(&self) -> Result<Payload, FetchError>;
}
