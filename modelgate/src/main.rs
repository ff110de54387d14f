use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use args::{Args, Command};

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(&args.log_filter);

    match args.command {
        Command::Serve { config, port } => serve(config, port).await,
    }
}

async fn serve(config_path: PathBuf, port_override: Option<u16>) -> anyhow::Result<()> {
    let config_path = std::path::absolute(&config_path)
        .with_context(|| format!("resolve config path {}", config_path.display()))?;

    let mut config = config::Config::load(&config_path)?;

    if let Some(port) = port_override {
        anyhow::ensure!(port != 0, "port override must be a valid TCP port");
        config.server.port = port;
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    server::serve(server::ServeConfig {
        config,
        config_path,
        port_override,
        shutdown,
    })
    .await
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(error) => {
                log::error!("failed to install SIGTERM handler: {error}");
                shutdown.cancel();
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    log::info!("shutdown requested");
    shutdown.cancel();
}
