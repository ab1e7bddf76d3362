use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cinder_server::{AppState, Config, Server};

/// cinder: a Redis-compatible in-memory key-value server.
#[derive(Debug, Parser)]
#[command(name = "cinder-server", version, about)]
struct Args {
    /// Path to the configuration file.
    #[arg(long, default_value = "cinder.toml")]
    config: PathBuf,

    /// Listen address (overrides the config file).
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,

    /// Log filter, e.g. "info" or "cinder=debug" (overrides the
    /// config file).
    #[arg(long)]
    log_level: Option<String>,

    /// Start with an empty keyspace when the snapshot file fails its
    /// checksum instead of refusing to start.
    #[arg(long)]
    ignore_corrupt_snapshot: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(host) = args.host {
        config.bind = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("cinder server starting...");

    let server = match Server::bind(config, args.ignore_corrupt_snapshot).await {
        Ok(server) => server,
        Err(e) => {
            error!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };

    let state = server.state();
    spawn_config_reloader(args.config, state);

    match server.run(shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Resolves when SIGINT, SIGTERM, or SIGQUIT arrives.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut int = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!("cannot install SIGINT handler: {e}");
            return std::future::pending().await;
        }
    };
    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("cannot install SIGTERM handler: {e}");
            return std::future::pending().await;
        }
    };
    let mut quit = match signal(SignalKind::quit()) {
        Ok(s) => s,
        Err(e) => {
            error!("cannot install SIGQUIT handler: {e}");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = int.recv() => info!("received SIGINT"),
        _ = term.recv() => info!("received SIGTERM"),
        _ = quit.recv() => info!("received SIGQUIT"),
    }
}

/// Re-reads the config file on SIGHUP and swaps in the runtime
/// tunables. Fields that require a restart (bind address, database
/// count) keep their original values.
fn spawn_config_reloader(path: PathBuf, state: Arc<AppState>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                error!("cannot install SIGHUP handler: {e}");
                return;
            }
        };

        while hup.recv().await.is_some() {
            match Config::load(&path) {
                Ok(fresh) => {
                    let mut current = state.config.write();
                    let bind = current.bind.clone();
                    let port = current.port;
                    let databases = current.databases;
                    *current = fresh;
                    current.bind = bind;
                    current.port = port;
                    current.databases = databases;
                    info!("configuration reloaded from {path:?}");
                }
                Err(e) => warn!("config reload failed, keeping current settings: {e}"),
            }
        }
    });
}
