//! Shared database handle passed to repositories and services.

use sqlx::PgPool;

/// Thin clonable wrapper around the connection pool.
#[derive(Debug, Clone)]
pub struct DbContext {
    pool: PgPool,
}

impl DbContext {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
