//! Fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use weathercache::cache::{CacheManager, RefreshMode};
use weathercache::payload::Payload;
use weathercache::store::MemoryStore;
use weathercache::weather::{DataSource, FetchError};

/// What the fake upstream does on its next call.
#[derive(Clone)]
pub enum Reply {
    Body(String),
    Status(u16),
}

/// Scriptable, call-counting `DataSource`.
#[derive(Clone)]
pub struct FakeSource {
    reply: Arc<Mutex<Reply>>,
    calls: Arc<AtomicUsize>,
    latency: Duration,
}

impl FakeSource {
    pub fn returning(body: &str) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Reply::Body(body.to_string()))),
            calls: Arc::new(AtomicUsize::new(0)),
            latency: Duration::ZERO,
        }
    }

    /// Every fetch sleeps this long before replying.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing(status: u16) -> Self {
        let source = Self::returning("");
        source.set(Reply::Status(status));
        source
    }

    pub fn with_temp(temp: f64) -> Self {
        Self::returning(&temp_body(temp))
    }

    pub fn set(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn set_temp(&self, temp: f64) {
        self.set(Reply::Body(temp_body(temp)));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for FakeSource {
    async fn fetch(&self) -> Result<Payload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Body(body) => Ok(Payload::from(body)),
            Reply::Status(status) => Err(FetchError::UpstreamStatus {
                status,
                body: "upstream unavailable".into(),
            }),
        }
    }
}

pub fn temp_body(temp: f64) -> String {
    format!(r#"{{"main":{{"temp":{temp}}}}}"#)
}

pub fn live_manager(source: &FakeSource) -> CacheManager {
    CacheManager::new(
        Arc::new(source.clone()),
        Arc::new(MemoryStore::new()),
        RefreshMode::Live,
    )
}

/// Extract `main.temp` from a stored weather document.
pub fn temp_of(payload: &Payload) -> f64 {
    let json: serde_json::Value = serde_json::from_slice(payload.as_bytes()).unwrap();
    json["main"]["temp"].as_f64().unwrap()
}
