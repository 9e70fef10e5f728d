//! Process orchestration: owns the root cancellation token and the
//! collector manager, wires the raw-metric pipeline into the aggregation
//! kernel, serves the HTTP API, and drives graceful shutdown. Ported from
//! `cmd/node/main.go` + `cmd/etlmon/main.go`'s orchestration, folded into
//! one process per spec.md §1's unified `NodeConfig`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::aggregator::AggregationKernel;
use crate::api::{self, AppState};
use crate::collector::RawMetricsManager;
use crate::config::NodeConfig;
use crate::manager::CollectorManager;
use crate::model::Sample;
use crate::storage::Store;

/// Capacity of the raw-sample channel between [`RawMetricsManager`] and the
/// aggregator consumer loop. Full channel means dropped batches -- the
/// spec's deliberate discard-on-full backpressure (spec.md §4.2, §5).
const SAMPLE_CHANNEL_CAPACITY: usize = 256;

/// How often the aggregator consumer loop checks for completed windows.
/// Fixed at 1 Hz per spec.md §4.1.
const WINDOW_CHECK_INTERVAL: Duration = Duration::from_secs(1);

pub struct Server {
    config: NodeConfig,
    config_path: String,
}

impl Server {
    pub fn new(config: NodeConfig, config_path: String) -> Self {
        Self { config, config_path }
    }

    pub async fn run(self) -> Result<()> {
        let listen_addr: std::net::SocketAddr = self
            .config
            .node
            .listen
            .parse()
            .with_context(|| format!("invalid listen address: {}", self.config.node.listen))?;

        let store = Arc::new(
            Store::open(&self.config.node.db_path)
                .with_context(|| format!("failed to open store at {}", self.config.node.db_path))?,
        );

        let root_token = CancellationToken::new();

        let manager = Arc::new(CollectorManager::new(
            Arc::clone(&store),
            root_token.clone(),
            self.config.refresh.disk,
        ));
        manager.start_all(&self.config).await.context("failed to start collectors")?;

        let kernel = Arc::new(AggregationKernel::new(
            &self.config.aggregation.windows,
            self.config.aggregation.aggregations.clone(),
        ));

        let (sample_tx, sample_rx) = mpsc::channel::<Vec<Sample>>(SAMPLE_CHANNEL_CAPACITY);
        let raw_manager = Arc::new(RawMetricsManager::new(
            self.config.aggregation.sample_interval,
            self.config.aggregation.resources.clone(),
        ));
        Arc::clone(&raw_manager)
            .start(root_token.clone(), sample_tx)
            .context("failed to start raw metrics pipeline")?;

        let aggregator_handle = spawn_aggregator_loop(
            Arc::clone(&kernel),
            Arc::clone(&store),
            sample_rx,
            root_token.clone(),
        );

        let (reload_tx, reload_rx) = mpsc::channel::<NodeConfig>(8);
        let reload_handle =
            spawn_reload_loop(Arc::clone(&manager), reload_rx, root_token.clone());

        let state = AppState {
            store: Arc::clone(&store),
            scanner: manager.scanner_proxy(),
            config: Arc::new(RwLock::new(self.config.clone())),
            config_path: Arc::new(self.config_path.clone()),
            reload_tx,
            started_at: chrono::Utc::now(),
        };
        let app = api::create_router(state);

        let listener = TcpListener::bind(listen_addr)
            .await
            .with_context(|| format!("failed to bind {listen_addr}"))?;

        tracing::info!(addr = %listen_addr, node = %self.config.node.node_name, "etlmon-node listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(root_token.clone()))
            .await
            .context("HTTP server error")?;

        tracing::info!("shutting down collectors");
        root_token.cancel();
        manager.stop_all().await;
        raw_manager.stop().await;
        aggregator_handle.abort();
        reload_handle.abort();

        Ok(())
    }
}

/// Multiplexes incoming raw-sample batches and a 1 Hz window-completion
/// check into one consumer loop, per spec.md's control-flow description.
/// Emission is infallible; save failures are logged, never fatal
/// (spec.md §7).
fn spawn_aggregator_loop(
    kernel: Arc<AggregationKernel>,
    store: Arc<Store>,
    mut sample_rx: mpsc::Receiver<Vec<Sample>>,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(WINDOW_CHECK_INTERVAL);
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                batch = sample_rx.recv() => {
                    match batch {
                        Some(samples) => {
                            for sample in samples {
                                kernel.add(sample);
                            }
                        }
                        None => return,
                    }
                }
                _ = ticker.tick() => {
                    let results = kernel.check_windows(chrono::Utc::now());
                    if !results.is_empty() {
                        if let Err(err) = store.save_aggregation_results(&results) {
                            tracing::warn!(error = %err, "failed to save aggregation results");
                        }
                    }
                }
            }
        }
    })
}

/// Consumes configs handed over from `PUT /api/v1/config`, applying each
/// as an asynchronous reload (spec.md §6). Reload failures are logged,
/// not fatal -- the manager's best-effort semantics (spec.md §4.6).
fn spawn_reload_loop(
    manager: Arc<CollectorManager>,
    mut reload_rx: mpsc::Receiver<NodeConfig>,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                cfg = reload_rx.recv() => {
                    match cfg {
                        Some(cfg) => {
                            if let Err(err) = manager.reload(&cfg).await {
                                tracing::error!(error = %err, "config reload failed");
                            } else {
                                tracing::info!("config reload applied");
                            }
                        }
                        None => return,
                    }
                }
            }
        }
    })
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down gracefully"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down gracefully"),
        _ = token.cancelled() => {}
    }
}
