//! HTTP listener, request logging, graceful shutdown, and the hot-reload
//! controller that swaps the dispatch plane underneath live handlers.

mod reload;

use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use arc_swap::ArcSwap;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use config::Config;
use gateway::SharedDispatcher;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use reload::watch_config;

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);
/// Bound on one whole request, upstream round-trip included.
const REQUEST_DEADLINE: Duration = Duration::from_secs(45);
/// How often the hot-reload controller polls the config source.
pub const RELOAD_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct ServeConfig {
    pub config: Config,
    pub config_path: PathBuf,
    pub port_override: Option<u16>,
    pub shutdown: CancellationToken,
}

/// Start the gateway and block until the shutdown token fires. In-flight
/// requests get a bounded grace window to drain.
pub async fn serve(serve_config: ServeConfig) -> anyhow::Result<()> {
    let ServeConfig {
        config,
        config_path,
        port_override,
        shutdown,
    } = serve_config;

    let dispatcher = gateway::build_dispatcher(&config)?;
    let shared: SharedDispatcher = Arc::new(ArcSwap::from_pointee(dispatcher));

    let app = gateway::router(Arc::clone(&shared)).layer(middleware::from_fn(log_request));

    let listen_address = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(listen_address)
        .await
        .with_context(|| format!("bind {listen_address}"))?;

    let initial_modified = std::fs::metadata(&config_path)
        .and_then(|metadata| metadata.modified())
        .with_context(|| format!("stat config file {}", config_path.display()))?;

    tokio::spawn(watch_config(
        Arc::clone(&shared),
        config_path,
        initial_modified,
        port_override,
        RELOAD_POLL_INTERVAL,
        shutdown.clone(),
    ));

    print_startup_banner(config.server.port);
    log::info!("starting server on {listen_address}");

    let graceful = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move { graceful.cancelled().await });

    tokio::select! {
        result = server => result.context("http server failed")?,
        () = grace_window_elapsed(shutdown) => {
            log::warn!("graceful shutdown window elapsed before all connections drained");
        }
    }

    log::info!("server shutdown complete");

    Ok(())
}

async fn grace_window_elapsed(shutdown: CancellationToken) {
    shutdown.cancelled().await;
    tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;
}

/// Request-boundary structured log, plus the whole-request deadline.
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let started = Instant::now();

    let response = match tokio::time::timeout(REQUEST_DEADLINE, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            log::error!("request deadline elapsed for {method} {uri}");
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
    };

    let status = response.status().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;
    let error = response
        .extensions()
        .get::<gateway::ErrorMessage>()
        .map(|message| message.0.clone())
        .unwrap_or_default();

    if status >= 500 {
        log::error!(method = method.as_str(), uri = uri.as_str(), status = status, latency_ms = latency_ms, error = error.as_str(); "request");
    } else if status >= 400 {
        log::warn!(method = method.as_str(), uri = uri.as_str(), status = status, latency_ms = latency_ms, error = error.as_str(); "request");
    } else {
        log::info!(method = method.as_str(), uri = uri.as_str(), status = status, latency_ms = latency_ms; "request");
    }

    response
}

fn print_startup_banner(port: u16) {
    println!();
    println!("modelgate ready");
    println!("Listening on http://127.0.0.1:{port}");
    println!("Endpoints:");
    println!("  GET  /health");
    println!("  POST /v1/chat/completions");
    println!("  POST /v1/completions");
    println!("  POST /v1/messages");
    println!("Point OpenAI-compatible clients or the Claude CLI at this address; configured providers handle translation.");
    println!();
}
