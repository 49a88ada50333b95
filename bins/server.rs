use common::utils::logging::{init_logging, LogFormat};
use configs::AppConfig;
use dotenvy::dotenv;
use tracing::{error, info, warn};
use uuid::Uuid;

fn main() -> std::process::ExitCode {
    // .env first so RUST_LOG, LOG_FORMAT and DATABASE_URL apply
    dotenv().ok();

    let cfg = AppConfig::load_and_validate();
    let format = match &cfg {
        Ok(cfg) => cfg.server.log_format.as_deref().map(LogFormat::parse).unwrap_or_default(),
        Err(_) => LogFormat::from_env(),
    };
    init_logging(format);

    let cfg = match cfg {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(service = "keystore", event = "config_invalid", error = %e, "failed to load configuration");
            return std::process::ExitCode::FAILURE;
        }
    };

    let instance_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(
            service = "keystore",
            event = "panic",
            %instance_id,
            pid,
            message = %info,
            "unhandled panic occurred"
        );
    }));

    let worker_threads = cfg.server.worker_threads;
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(w) = worker_threads {
        builder.worker_threads(w);
    }

    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "keystore", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(
        service = "keystore",
        event = "start",
        %instance_id,
        pid,
        version,
        threads = worker_threads.unwrap_or_default(),
        "key store server starting"
    );

    rt.block_on(async move {
        let shutdown = async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!(service = "keystore", event = "shutdown_signal", %instance_id, pid, "received Ctrl+C, draining"),
                Err(e) => {
                    warn!(service = "keystore", event = "signal_error", error = %e, "cannot listen for Ctrl+C");
                    std::future::pending::<()>().await;
                }
            }
        };

        match server::run_with_shutdown(cfg, shutdown).await {
            Ok(()) => {
                info!(service = "keystore", event = "stop", %instance_id, pid, "server stopped normally");
                std::process::ExitCode::SUCCESS
            }
            Err(e) => {
                error!(service = "keystore", event = "run_failed", error = %e, "server exited with error");
                std::process::ExitCode::FAILURE
            }
        }
    })
}
