//! Application state shared across components (poller, web).

use crate::cache::CacheManager;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Health status of a service.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Starting,
    Active,
    Stopped,
    Error,
}

/// A timestamped status entry for a service.
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub status: ServiceStatus,
    pub updated_at: Instant,
}

/// Thread-safe registry for services to self-report their health status.
#[derive(Debug, Clone, Default)]
pub struct ServiceStatusRegistry {
    inner: Arc<DashMap<String, StatusEntry>>,
}

impl ServiceStatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates the status for a named service.
    pub fn set(&self, name: &str, status: ServiceStatus) {
        self.inner.insert(
            name.to_owned(),
            StatusEntry {
                status,
                updated_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<ServiceStatus> {
        self.inner.get(name).map(|entry| entry.status)
    }

    /// Returns a snapshot of all service statuses with seconds since last change.
    pub fn all(&self) -> Vec<(String, ServiceStatus, u64)> {
        self.inner
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().status,
                    entry.value().updated_at.elapsed().as_secs(),
                )
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
    pub service_statuses: ServiceStatusRegistry,
    /// Applied to every HTTP request by the router.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(cache: Arc<CacheManager>, service_statuses: ServiceStatusRegistry) -> Self {
        Self {
            cache,
            service_statuses,
            request_timeout: crate::web::MIN_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
