use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;

/// Shared handler state: one database pool, one immutable config.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self { pool, config: Arc::new(config) }
    }
}
