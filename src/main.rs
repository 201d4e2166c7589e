// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{io, net::SocketAddr, process::ExitCode, sync::Arc};

use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use dealwatch_auth_server::{
    api::router,
    auth::{AuthError, AuthGate, NonceSweeper, SystemClock},
    config::{ConfigError, Settings},
    state::AppState,
    telemetry::{init_tracing, LogFormat},
};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("failed to initialise logging: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build auth gate: {0}")]
    Gate(#[from] AuthError),

    #[error("invalid bind address {addr}: {source}")]
    Address {
        addr: String,
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The subscriber may not be installed yet.
            eprintln!("dealwatch-auth-server: {e}");
            error!(error = %e, "Server exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    init_tracing(LogFormat::from_env())?;

    let settings = Settings::from_env()?;
    info!(?settings, "Configuration loaded");

    let gate = AuthGate::from_settings(&settings, Arc::new(SystemClock))?;

    let shutdown = CancellationToken::new();
    let sweeper = NonceSweeper::new(gate.nonce_store(), settings.nonce_sweep_interval);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let app = router(AppState::new(gate));

    let addr_str = format!("{}:{}", settings.host, settings.port);
    let addr: SocketAddr = addr_str
        .parse()
        .map_err(|source| StartupError::Address {
            addr: addr_str.clone(),
            source,
        })?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    info!(%addr, "DealWatch auth server listening (docs at /docs)");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .map_err(StartupError::Serve);

    shutdown.cancel();
    if let Err(e) = sweeper_handle.await {
        error!(error = %e, "Nonce sweeper task failed");
    }

    info!("Server stopped");
    result
}

/// Resolve on Ctrl+C or SIGTERM, then cancel background tasks.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}
