//! Background refresh of the cached weather record.

use super::Service;
use crate::cache::CacheManager;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs the cache manager's poll loop for the lifetime of the process.
pub struct PollerService {
    cache: Arc<CacheManager>,
    interval: Duration,
}

impl PollerService {
    pub fn new(cache: Arc<CacheManager>, interval: Duration) -> Self {
        Self { cache, interval }
    }
}

#[async_trait]
impl Service for PollerService {
    fn name(&self) -> &'static str {
        "poller"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> anyhow::Result<()> {
        self.cache.start_poll(self.interval)?;
        shutdown.cancelled().await;
        self.cache.stop_poll().await;
        Ok(())
    }
}
