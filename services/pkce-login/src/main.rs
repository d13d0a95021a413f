//! PKCE Login Demo
//!
//! Single-binary web app that signs a user in against an OAuth2 identity
//! provider with the authorization code flow and PKCE:
//! 1. `/login` stores a fresh state and verifier in the session and
//!    redirects to the provider with the code challenge
//! 2. `/callback` checks the state, redeems the code and shows userinfo
//! 3. `/logout` destroys the session and hands off to the provider logout

mod config;
mod error;
mod metrics;
mod pages;
mod routes;
mod session;

use anyhow::{Context, Result};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, TlsConfig};
use crate::routes::AppState;

/// How long in-flight requests get to finish once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Optional; real environment variables always win over .env entries
    let dotenv_path = dotenv::dotenv().ok();

    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting pkce-login");
    if let Some(path) = dotenv_path {
        info!(path = %path.display(), "loaded .env");
    }

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file, using environment only"),
    }

    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;

    info!(
        listen_addr = %config.server.listen_addr,
        tls = config.server.tls.is_some(),
        client_id = %config.provider.client_id,
        authorization_url = %config.provider.authorization_url,
        claim = %config.provider.claim,
        "configuration loaded"
    );
    if config.server.session_secret_generated {
        warn!("SESSION_SECRET not set, using a random secret; sessions will not survive a restart");
    }

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let app_state = AppState {
        provider: Arc::new(config.provider),
        http,
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };
    let app = routes::build_router(app_state, &config.server);

    match &config.server.tls {
        Some(tls) => serve_tls(app, config.server.listen_addr, tls).await?,
        None => serve_plain(app, config.server.listen_addr).await?,
    }

    info!("shutdown complete");
    Ok(())
}

/// Serve plain HTTP until a shutdown signal, then drain.
///
/// The drain timeout starts when the signal fires, not when the server
/// starts: the server is told to drain, then the drain is raced against
/// `DRAIN_TIMEOUT` so a slow client cannot block process exit.
async fn serve_plain(app: Router, addr: SocketAddr) -> error::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| error::Error::Bind { addr, source })?;
    info!(addr = %addr, "listening on http");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => return Err(error::Error::Serve(e)),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }
    Ok(())
}

/// Serve HTTPS from the configured PEM files until a shutdown signal, then
/// drain. `axum_server` enforces the drain timeout itself.
async fn serve_tls(app: Router, addr: SocketAddr, tls: &TlsConfig) -> error::Result<()> {
    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|source| error::Error::Tls {
            key: tls.key_path.clone(),
            cert: tls.cert_path.clone(),
            source,
        })?;

    let handle = axum_server::Handle::new();
    let server_handle = tokio::spawn({
        let handle = handle.clone();
        async move {
            axum_server::bind_rustls(addr, rustls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    });
    info!(addr = %addr, "listening on https");

    shutdown_signal().await;
    handle.graceful_shutdown(Some(DRAIN_TIMEOUT));

    match server_handle.await {
        Ok(Ok(())) => info!("all in-flight requests drained"),
        Ok(Err(e)) => return Err(error::Error::Serve(e)),
        Err(e) => error!(error = %e, "server task panicked"),
    }
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
