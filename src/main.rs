use std::{net::SocketAddr, path::PathBuf, process::ExitCode};

use clap::Parser;
use graviola::{AppState, api, config::GraviolaConfig, observability};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "graviola",
    about = "A read-only query federator for Prometheus-compatible metric storages"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match GraviolaConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("graviola: {err}");
            return ExitCode::FAILURE;
        }
    };

    observability::tracing_init::init_tracing(&config.log);

    if let Err(err) = observability::metrics::init_metrics() {
        tracing::error!(error = %err, "failed to install the metrics recorder");
        return ExitCode::FAILURE;
    }

    let port = config.api.port;
    let shutdown_grace = config.api.timeout.as_duration();

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "failed to assemble the application");
            return ExitCode::FAILURE;
        }
    };

    let app = api::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "failed to bind listen address");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%addr, "starting Graviola");

    let shutdown = CancellationToken::new();
    let serve = {
        let shutdown = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
    };
    let mut serve_task = tokio::spawn(async move { serve.await });

    tokio::select! {
        result = &mut serve_task => {
            return match result {
                Ok(Ok(())) => ExitCode::SUCCESS,
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "server error");
                    ExitCode::FAILURE
                }
                Err(err) => {
                    tracing::error!(error = %err, "server task failed");
                    ExitCode::FAILURE
                }
            };
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining in-flight requests");
            shutdown.cancel();
        }
    }

    if tokio::time::timeout(shutdown_grace, &mut serve_task)
        .await
        .is_err()
    {
        tracing::warn!(
            grace = ?shutdown_grace,
            "shutdown grace period expired with requests still in flight"
        );
        serve_task.abort();
    }

    tracing::info!("stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
