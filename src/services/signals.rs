//! Process signal handling and coordinated shutdown.

use super::manager::ServiceManager;
use crate::utils::fmt_duration;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

/// Run until SIGINT/SIGTERM or until a service exits on its own, then stop
/// every service within `shutdown_timeout`.
///
/// Exits non-zero if a service failed or shutdown overran the timeout.
pub async fn handle_shutdown_signals(
    mut service_manager: ServiceManager,
    shutdown_timeout: Duration,
) -> ExitCode {
    let mut exit_code = tokio::select! {
        signal = shutdown_signal() => {
            info!(signal, "shutdown signal received");
            ExitCode::SUCCESS
        }
        (name, result) = service_manager.wait_for_exit() => {
            match result {
                Ok(()) => warn!(service = name, "service exited unexpectedly"),
                Err(e) => error!(service = name, error = ?e, "service failed"),
            }
            ExitCode::FAILURE
        }
    };

    info!(
        timeout = fmt_duration(shutdown_timeout),
        "shutting down services"
    );
    match service_manager.shutdown(shutdown_timeout).await {
        Ok(elapsed) => info!(duration = fmt_duration(elapsed), "graceful shutdown complete"),
        Err(pending) => {
            error!(pending = ?pending, "forced shutdown, services did not stop in time");
            exit_code = ExitCode::FAILURE;
        }
    }

    exit_code
}

/// Resolves with the name of the first termination signal received.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = ?e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
