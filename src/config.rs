//! Environment-driven configuration.

use serde::Deserialize;

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// Application configuration, extracted from the environment via figment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds to wait for services to drain on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
    /// Soft wall-clock ceiling for one generation job, in seconds. Absent
    /// means unlimited: the planner runs to the end of the window.
    #[serde(default)]
    pub job_time_limit: Option<u64>,
}
