//! HTTP server service.

use super::Service;
use crate::state::AppState;
use crate::web::create_router;
use anyhow::Context;
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct WebService {
    port: u16,
    app_state: AppState,
}

impl WebService {
    pub fn new(port: u16, app_state: AppState) -> Self {
        Self { port, app_state }
    }
}

#[async_trait]
impl Service for WebService {
    fn name(&self) -> &'static str {
        "web"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!(address = %addr, "web server listening");

        let router = create_router(self.app_state);
        // Stops accepting on cancel, then waits for in-flight requests.
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("web server failed")?;

        info!("web server stopped");
        Ok(())
    }
}
