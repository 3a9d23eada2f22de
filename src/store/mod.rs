//! Persistence for the single cached weather record.
//!
//! The cache *is* the store: whatever was last written under [`LOCATION_KEY`]
//! is the last known good value. Backends must make a `put` fully visible to
//! any `get` issued after it returns, and must never expose a half-written
//! record.

pub mod memory;
pub mod postgres;

use crate::payload::Payload;
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Key of the one record this service caches (French Quarter zip code).
pub const LOCATION_KEY: &str = "70117";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing has been written under this key yet.
    #[error("no record stored for key {key:?}")]
    NotFound { key: String },
    #[error("store backend failure")]
    Backend(#[source] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.into())
    }
}

/// Whole-record key/value storage shared between the poll loop and HTTP handlers.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Replace the record under `key`.
    async fn put(&self, key: &str, payload: Payload) -> Result<(), StoreError>;

    /// Read the record under `key`, or [`StoreError::NotFound`].
    async fn get(&self, key: &str) -> Result<Payload, StoreError>;

    /// Short backend name for logs and the status endpoint.
    fn backend(&self) -> &'static str;
}
