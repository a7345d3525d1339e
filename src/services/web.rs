//! HTTP service wrapping the axum router.

use crate::services::manager::Service;
use crate::state::{AppState, ServiceStatus};
use crate::web::create_router;
use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

pub struct WebService {
    port: u16,
    state: AppState,
}

impl WebService {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }
}

#[async_trait]
impl Service for WebService {
    async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let router = create_router(self.state.clone());
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", self.port))
            .await
            .with_context(|| format!("failed to bind port {}", self.port))?;

        info!(port = self.port, "web server listening");
        self.state.service_statuses.set("web", ServiceStatus::Active);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("web server received shutdown signal");
            })
            .await
            .context("web server error")?;

        Ok(())
    }
}
