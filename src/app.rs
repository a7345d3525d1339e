//! Application assembly: config, database, services.

use crate::config::Config;
use crate::data::DbContext;
use crate::jobs::{GenerationWorker, JobRegistry};
use crate::services::generation::GenerationService;
use crate::services::manager::ServiceManager;
use crate::services::signals::handle_shutdown_signals;
use crate::services::web::WebService;
use crate::state::AppState;
use crate::utils::fmt_duration;
use anyhow::Context;
use figment::{providers::Env, Figment};
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

/// Main application struct containing all components.
pub struct App {
    config: Config,
    state: AppState,
    worker: Option<GenerationWorker>,
    service_manager: ServiceManager,
}

impl App {
    /// Creates the application: loads config, connects to the database,
    /// runs migrations, and wires the job queue.
    pub async fn new() -> Result<Self, anyhow::Error> {
        let config: Config = Figment::new()
            .merge(Env::raw())
            .extract()
            .context("failed to load config")?;

        let slow_threshold = Duration::from_millis(500);
        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_slow_threshold(slow_threshold)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect(&config.database_url)
            .await
            .context("failed to create database pool")?;

        info!(
            max_connections = 4,
            acquire_timeout = "4s",
            acquire_slow_threshold = fmt_duration(slow_threshold),
            "database pool established"
        );

        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("failed to run database migrations")?;
        info!("database migrations applied");

        let db = DbContext::new(db_pool);
        let registry = JobRegistry::new();
        let soft_deadline = config.job_time_limit.map(Duration::from_secs);
        let (worker, jobs) = GenerationWorker::new(db.clone(), registry, soft_deadline);
        let state = AppState::new(db, jobs);

        Ok(App {
            config,
            state,
            worker: Some(worker),
            service_manager: ServiceManager::new(),
        })
    }

    /// Registers the web and generation services.
    pub fn setup_services(&mut self) -> Result<(), anyhow::Error> {
        let web_service = Box::new(WebService::new(self.config.port, self.state.clone()));
        self.service_manager.register_service("web", web_service);

        let worker = self
            .worker
            .take()
            .ok_or_else(|| anyhow::anyhow!("generation worker already taken"))?;
        let generation_service = Box::new(GenerationService::new(
            worker,
            self.state.service_statuses.clone(),
        ));
        self.service_manager
            .register_service("generator", generation_service);

        Ok(())
    }

    /// Starts all registered services.
    pub fn start_services(&mut self) {
        self.service_manager.spawn_all();
    }

    /// Runs the application until a shutdown signal arrives.
    pub async fn run(self) -> ExitCode {
        handle_shutdown_signals(self.service_manager, self.config.shutdown_timeout).await
    }
}
