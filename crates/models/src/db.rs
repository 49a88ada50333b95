use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::info;

pub use configs::DatabaseConfig;

use crate::errors::ModelError;

pub fn connect_options(cfg: &DatabaseConfig) -> ConnectOptions {
    let mut opts = ConnectOptions::new(cfg.url.clone());
    opts.max_connections(cfg.max_connections)
        .min_connections(cfg.min_connections)
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(cfg.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(cfg.max_lifetime_secs))
        .sqlx_logging(cfg.sqlx_logging);
    opts
}

/// Build a pool from validated configuration.
pub async fn connect_with_config(cfg: &DatabaseConfig) -> Result<DatabaseConnection, ModelError> {
    let db = Database::connect(connect_options(cfg)).await.map_err(|e| ModelError::Db(e.to_string()))?;
    info!(max_connections = cfg.max_connections, "database pool ready");
    Ok(db)
}

/// Build a pool that opens no connection until the first statement, so an
/// unreachable server surfaces on first use instead of here.
pub async fn connect_lazy(cfg: &DatabaseConfig) -> Result<DatabaseConnection, ModelError> {
    let mut opts = connect_options(cfg);
    opts.connect_lazy(true);
    Database::connect(opts).await.map_err(|e| ModelError::Db(e.to_string()))
}
