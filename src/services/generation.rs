//! Service wrapper around the generation worker.

use crate::jobs::GenerationWorker;
use crate::services::manager::Service;
use crate::state::{ServiceStatus, ServiceStatusRegistry};
use async_trait::async_trait;
use tokio::sync::broadcast;

pub struct GenerationService {
    worker: GenerationWorker,
    statuses: ServiceStatusRegistry,
}

impl GenerationService {
    pub fn new(worker: GenerationWorker, statuses: ServiceStatusRegistry) -> Self {
        Self { worker, statuses }
    }
}

#[async_trait]
impl Service for GenerationService {
    async fn run(&mut self, shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        self.statuses.set("generator", ServiceStatus::Active);
        self.worker.run(shutdown_rx).await;
        Ok(())
    }
}
