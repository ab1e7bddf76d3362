//! Server assembly: shared state, the TCP accept loop, background
//! tasks, and graceful shutdown.
//!
//! Startup loads the snapshot file (when present), binds the
//! listener, and spawns two periodic tasks: the expiration sweep and
//! the snapshot scheduler (interval + change-count triggers). Each
//! accepted connection runs on its own task. Shutdown stops
//! accepting, cancels the periodic tasks, and writes a final full
//! snapshot.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cinder_core::{Store, StoreConfig};
use cinder_persistence::{SnapshotConfig, SnapshotError, Snapshotter};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::connection;
use crate::monitor::MonitorFeed;
use crate::slowlog::SlowLog;

/// How often the active expiration sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How often the change-count save trigger is evaluated.
const AUTO_SAVE_POLL: Duration = Duration::from_secs(1);

/// Errors that abort server startup or the accept loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("snapshot load failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// State shared by every connection and background task.
pub struct AppState {
    pub store: Arc<Store>,
    pub snapshotter: Arc<Snapshotter>,
    pub slowlog: SlowLog,
    pub monitor: MonitorFeed,
    /// Reloadable configuration (SIGHUP swaps the runtime tunables).
    pub config: RwLock<Config>,
    pub started_at: Instant,
    /// Currently connected clients, for INFO and the max-client gate.
    pub clients: AtomicUsize,
}

impl AppState {
    fn new(config: Config, store: Arc<Store>, snapshotter: Arc<Snapshotter>) -> Self {
        Self {
            slowlog: SlowLog::new(config.slowlog),
            monitor: MonitorFeed::new(),
            store,
            snapshotter,
            config: RwLock::new(config),
            started_at: Instant::now(),
            clients: AtomicUsize::new(0),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(config: Config) -> Self {
        let store = Arc::new(Store::with_config(StoreConfig {
            databases: config.databases,
        }));
        let snapshotter = Arc::new(Snapshotter::new(
            Arc::clone(&store),
            SnapshotConfig {
                filename: std::env::temp_dir()
                    .join(format!("cinder-dispatch-test-{}.rdb", std::process::id())),
                ..SnapshotConfig::default()
            },
        ));
        Self::new(config, store, snapshotter)
    }
}

/// A bound, ready-to-run server.
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
}

impl Server {
    /// Builds the engine, loads the snapshot if one exists, and binds
    /// the listener.
    ///
    /// A corrupt snapshot aborts startup unless `ignore_corrupt` is
    /// set, in which case the server starts with an empty keyspace.
    pub async fn bind(config: Config, ignore_corrupt: bool) -> Result<Server, ServerError> {
        let store = Arc::new(Store::with_config(StoreConfig {
            databases: config.databases,
        }));
        let snapshotter = Arc::new(Snapshotter::new(
            Arc::clone(&store),
            SnapshotConfig {
                filename: PathBuf::from(&config.rdb.filename),
                save_interval: config.save_interval(),
                compression_level: config.rdb.compression_level,
                auto_save_changes: config.rdb.auto_save_changes,
            },
        ));

        if snapshotter.filename().exists() {
            match snapshotter.load() {
                Ok(keys) => info!(keys, "loaded snapshot from {:?}", snapshotter.filename()),
                Err(e @ SnapshotError::Corrupt { .. }) if ignore_corrupt => {
                    warn!("ignoring corrupt snapshot, starting empty: {e}");
                    store.flushall();
                }
                Err(e) => return Err(ServerError::Snapshot(e)),
            }
        }

        let addr = format!("{}:{}", config.bind, config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("listening on {}", listener.local_addr()?);

        let state = Arc::new(AppState::new(config, store, snapshotter));
        Ok(Server { state, listener })
    }

    /// The bound address (useful when the config asked for port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle to the shared state, for signal handlers.
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Runs the accept loop until `shutdown` resolves, then performs
    /// the graceful shutdown sequence: stop accepting, cancel the
    /// periodic tasks, write a final full snapshot.
    pub async fn run(self, shutdown: impl std::future::Future<Output = ()>) -> Result<(), ServerError> {
        let sweeper = spawn_sweeper(Arc::clone(&self.state));
        let scheduler = spawn_save_scheduler(Arc::clone(&self.state));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    let state = Arc::clone(&self.state);

                    let max_clients = state.config.read().max_clients;
                    if max_clients > 0
                        && state.clients.load(std::sync::atomic::Ordering::SeqCst) >= max_clients
                    {
                        reject_client(stream).await;
                        continue;
                    }

                    tokio::spawn(async move {
                        if let Err(e) = connection::handle(stream, peer, state).await {
                            error!("connection error from {peer}: {e}");
                        }
                    });
                }
            }
        }

        // stop accepting before the final save
        drop(self.listener);
        sweeper.abort();
        scheduler.abort();

        info!("shutting down, writing final snapshot");
        match self.state.snapshotter.save_all() {
            Ok(keys) => info!(keys, "final snapshot written"),
            Err(e) => error!("final snapshot failed: {e}"),
        }
        Ok(())
    }
}

/// Tells an over-limit client why it's being dropped.
async fn reject_client(mut stream: tokio::net::TcpStream) {
    let _ = stream
        .write_all(b"-ERR max number of clients reached\r\n")
        .await;
}

/// Periodic active-expiration sweep.
fn spawn_sweeper(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        tick.tick().await; // the first tick fires immediately
        loop {
            tick.tick().await;
            cinder_core::expiry::sweep(&state.store);
        }
    })
}

/// Snapshot scheduler: interval saves plus the change-count trigger.
/// `SaveInProgress` simply means the previous save is still running.
fn spawn_save_scheduler(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_tick = tokio::time::interval(state.snapshotter.save_interval());
        interval_tick.tick().await;
        let mut change_tick = tokio::time::interval(AUTO_SAVE_POLL);
        change_tick.tick().await;

        loop {
            tokio::select! {
                _ = interval_tick.tick() => {
                    if state.store.dirty_len() > 0 {
                        start_background_save(&state);
                    }
                }
                _ = change_tick.tick() => {
                    if state.snapshotter.should_auto_save() {
                        start_background_save(&state);
                    }
                }
            }
        }
    })
}

fn start_background_save(state: &AppState) {
    match state.snapshotter.background_save() {
        Ok(()) | Err(SnapshotError::SaveInProgress) => {}
        Err(e) => error!("scheduled snapshot failed to start: {e}"),
    }
}
