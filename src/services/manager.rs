//! Registry and supervisor for the application's long-running services.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A long-running service driven until a shutdown signal arrives.
#[async_trait]
pub trait Service: Send {
    async fn run(&mut self, shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()>;
}

/// Owns registered services, spawns them, and drains them on shutdown.
pub struct ServiceManager {
    shutdown_tx: broadcast::Sender<()>,
    pending: Vec<(String, Box<dyn Service>)>,
    running: Vec<(String, JoinHandle<()>)>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            pending: Vec::new(),
            running: Vec::new(),
        }
    }

    pub fn register_service(&mut self, name: &str, service: Box<dyn Service>) {
        self.pending.push((name.to_owned(), service));
    }

    pub fn has_services(&self) -> bool {
        !self.pending.is_empty() || !self.running.is_empty()
    }

    /// Spawns every registered service on its own task.
    pub fn spawn_all(&mut self) {
        for (name, mut service) in self.pending.drain(..) {
            let shutdown_rx = self.shutdown_tx.subscribe();
            let task_name = name.clone();
            let handle = tokio::spawn(async move {
                if let Err(e) = service.run(shutdown_rx).await {
                    error!(service = %task_name, error = ?e, "service exited with error");
                }
            });
            info!(service = %name, "service spawned");
            self.running.push((name, handle));
        }
    }

    /// Broadcasts shutdown and waits up to `timeout` for each service.
    pub async fn shutdown(&mut self, timeout: Duration) {
        info!(services = self.running.len(), "shutting down services");
        let _ = self.shutdown_tx.send(());

        for (name, handle) in self.running.drain(..) {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => info!(service = %name, "service stopped"),
                Ok(Err(e)) => warn!(service = %name, error = ?e, "service task panicked"),
                Err(_) => warn!(service = %name, "service did not stop in time, abandoning"),
            }
        }
    }
}
