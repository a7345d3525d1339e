//! Process signal handling and graceful shutdown.

use crate::services::manager::ServiceManager;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

/// Blocks until SIGINT or SIGTERM, then drains all services.
pub async fn handle_shutdown_signals(
    mut manager: ServiceManager,
    shutdown_timeout_secs: u64,
) -> ExitCode {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }

    manager
        .shutdown(Duration::from_secs(shutdown_timeout_secs))
        .await;
    info!("shutdown complete");
    ExitCode::SUCCESS
}
