//! Long-running services and their lifecycle.

pub mod manager;
pub mod poller;
pub mod signals;
pub mod web;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A unit of work that runs until its shutdown token is cancelled.
#[async_trait]
pub trait Service: Send + 'static {
    fn name(&self) -> &'static str;

    /// Run to completion. Must return promptly once `shutdown` is cancelled.
    async fn run(self: Box<Self>, shutdown: CancellationToken) -> anyhow::Result<()>;
}
