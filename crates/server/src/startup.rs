use std::future::Future;
use std::sync::Arc;

use common::utils::logging::{init_logging, LogFormat};
use configs::{AppConfig, LoadPolicy};
use dotenvy::dotenv;
use migration::{Migrator, MigratorTrait};
use service::auth::{ApiKeyGenerator, RandomApiKeyGenerator};
use service::keystore::repo::seaorm::SeaOrmKeyStoreRepository;
use service::keystore::{LoadStatus, ServiceKeyStore, StoreOptions};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::errors::StartupError;
use crate::routes::{self, auth::ServerState};

/// Connect, migrate and load the key store.
///
/// Under `fail_open` the pool connects lazily and a failed migration is only
/// logged, so an unreachable database yields a running server with a
/// degraded store. Under `fail_closed` every step must succeed.
pub async fn build_state(cfg: &AppConfig) -> Result<ServerState, StartupError> {
    let policy = cfg.keystore.load_policy;
    let db = match policy {
        LoadPolicy::FailClosed => models::db::connect_with_config(&cfg.database).await,
        LoadPolicy::FailOpen => models::db::connect_lazy(&cfg.database).await,
    }
    .map_err(|e| StartupError::Database(e.to_string()))?;

    if cfg.database.run_migrations {
        if let Err(e) = Migrator::up(&db, None).await {
            match policy {
                LoadPolicy::FailClosed => return Err(StartupError::Migration(e.to_string())),
                LoadPolicy::FailOpen => warn!(error = %e, "migrations not applied"),
            }
        }
    }

    let repo = Arc::new(SeaOrmKeyStoreRepository { db });
    let (store, status) = ServiceKeyStore::open(repo, StoreOptions::from(&cfg.keystore))
        .await
        .map_err(|e| StartupError::KeyStore(e.to_string()))?;
    match &status {
        LoadStatus::Loaded { count } => info!(count, "key store ready"),
        LoadStatus::Degraded { reason } => warn!(%reason, "key store degraded; use POST /admin/services/reload once the database is back"),
    }

    let keygen: Arc<dyn ApiKeyGenerator> = Arc::new(RandomApiKeyGenerator::new(cfg.auth.key_prefix.clone()));
    let state = ServerState::new(Arc::new(store), keygen);
    Ok(match cfg.auth.admin_key.as_deref() {
        Some(key) => state.with_admin_key(key),
        None => {
            warn!("auth.admin_key is not set; /admin routes are disabled");
            state
        }
    })
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn run_with_shutdown<F>(cfg: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = build_state(&cfg).await?;
    let app = routes::build_router(state, routes::api_cors());

    let addr = cfg.server.bind_addr();
    let listener = TcpListener::bind(&addr).await.map_err(StartupError::from)?;
    info!(%addr, "key store server listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    info!("key store server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Public entry: load `.env` and configuration, initialise logging and serve
/// until Ctrl+C.
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    let cfg = AppConfig::load_and_validate().map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    let format = cfg.server.log_format.as_deref().map(LogFormat::parse).unwrap_or_default();
    init_logging(format);
    run_with_shutdown(cfg, shutdown_signal()).await
}
