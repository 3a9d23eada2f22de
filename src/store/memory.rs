//! In-process record store. Contents are lost on restart.

use super::{RecordStore, StoreError};
use crate::payload::Payload;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, Payload>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, key: &str, payload: Payload) -> Result<(), StoreError> {
        self.records.insert(key.to_owned(), payload);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Payload, StoreError> {
        self.records
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_owned(),
            })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
