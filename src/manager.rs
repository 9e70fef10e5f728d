//! Collector Manager & Scanner Proxy (C7): lifecycle supervision of the
//! collector fleet, and a read-safe pointer swap for the path scanner
//! reference exposed to HTTP handlers. Ported from
//! `internal/manager/manager.go`'s `CollectorManager`, re-architected per
//! spec.md §9 to be unidirectional: this type holds only a child token
//! derived from the orchestrator's root token, never a back-pointer to it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::collector::{Collector, FsUsageCollector, LogTailer, PathScanner, ProcessSampler, ScanPaths};
use crate::config::NodeConfig;
use crate::error::CollectorError;
use crate::storage::Store;

/// Indirection the HTTP layer depends on instead of a concrete
/// `PathScanner`, so `Reload` can swap scanners out from underneath a
/// running server without handlers ever observing a torn state.
///
/// `scan_paths` snapshots the current `Arc<PathScanner>` under a read
/// lock, releases it, then calls through -- a handler that started before
/// `update` returns runs to completion against the scanner it snapshotted,
/// never a newer one (spec.md §8 invariant 7).
pub struct ScannerProxy {
    current: RwLock<Option<Arc<PathScanner>>>,
}

impl ScannerProxy {
    pub fn new() -> Self {
        Self { current: RwLock::new(None) }
    }

    pub async fn update(&self, scanner: Option<Arc<PathScanner>>) {
        *self.current.write().await = scanner;
    }
}

impl Default for ScannerProxy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanPaths for ScannerProxy {
    async fn trigger_scan(&self, paths: &[String]) -> Result<(), CollectorError> {
        let scanner = self.current.read().await.clone();
        match scanner {
            Some(scanner) => scanner.trigger_scan(paths).await,
            None => Err(CollectorError::NotConfigured("no path scanner configured".to_string())),
        }
    }
}

/// The dynamic collector set: parametrized by user config, torn down and
/// recreated wholesale on every `reload`.
struct DynamicCollectors {
    token: CancellationToken,
    path_scanner: Arc<PathScanner>,
    process_sampler: Arc<ProcessSampler>,
    log_tailer: Arc<LogTailer>,
}

impl DynamicCollectors {
    async fn stop(self) {
        self.token.cancel();
        self.path_scanner.stop().await;
        self.process_sampler.stop().await;
        self.log_tailer.stop().await;
    }
}

/// Supervises the collector fleet: one static collector (filesystem
/// usage, independent of user config) and a dynamic set (path scanner,
/// process sampler, log tailer) that `reload` replaces wholesale.
pub struct CollectorManager {
    store: Arc<Store>,
    root_token: CancellationToken,
    fs_collector: Arc<FsUsageCollector>,
    scanner_proxy: Arc<ScannerProxy>,
    dynamic: AsyncMutex<Option<DynamicCollectors>>,
}

impl CollectorManager {
    pub fn new(store: Arc<Store>, root_token: CancellationToken, disk_refresh: Duration) -> Self {
        Self {
            fs_collector: Arc::new(FsUsageCollector::new(Arc::clone(&store), disk_refresh)),
            scanner_proxy: Arc::new(ScannerProxy::new()),
            dynamic: AsyncMutex::new(None),
            store,
            root_token,
        }
    }

    pub fn scanner_proxy(&self) -> Arc<ScannerProxy> {
        Arc::clone(&self.scanner_proxy)
    }

    fn build_dynamic(&self, cfg: &NodeConfig) -> (CancellationToken, Arc<PathScanner>, Arc<ProcessSampler>, Arc<LogTailer>) {
        let token = self.root_token.child_token();
        let path_scanner = Arc::new(PathScanner::new(Arc::clone(&self.store), cfg.paths.clone()));
        let process_sampler = Arc::new(ProcessSampler::new(
            Arc::clone(&self.store),
            cfg.refresh.process,
            &cfg.process.patterns,
            cfg.process.top_n,
        ));
        let log_tailer =
            Arc::new(LogTailer::new(Arc::clone(&self.store), cfg.logs.clone(), cfg.refresh.log));
        (token, path_scanner, process_sampler, log_tailer)
    }

    /// Starts the static collector and a fresh dynamic set built from
    /// `cfg`. Called once at process start.
    pub async fn start_all(&self, cfg: &NodeConfig) -> Result<(), CollectorError> {
        let mut guard = self.dynamic.lock().await;

        self.fs_collector.start(self.root_token.child_token()).await?;

        let (token, path_scanner, process_sampler, log_tailer) = self.build_dynamic(cfg);
        path_scanner.start(token.clone()).await?;
        process_sampler.start(token.clone()).await?;
        log_tailer.start(token.clone()).await?;

        self.scanner_proxy.update(Some(Arc::clone(&path_scanner))).await;
        *guard = Some(DynamicCollectors { token, path_scanner, process_sampler, log_tailer });
        Ok(())
    }

    /// Stops the dynamic set, constructs a new one from `cfg`, and starts
    /// it under a fresh child token. The static collector is untouched.
    ///
    /// Best-effort, no rollback (spec.md §4.6, §9): if construction or
    /// start of the new set fails partway, whatever already started stays
    /// running and the error is returned to the caller.
    pub async fn reload(&self, cfg: &NodeConfig) -> Result<(), CollectorError> {
        let mut guard = self.dynamic.lock().await;

        if let Some(old) = guard.take() {
            old.stop().await;
        }

        let (token, path_scanner, process_sampler, log_tailer) = self.build_dynamic(cfg);
        path_scanner.start(token.clone()).await?;
        process_sampler.start(token.clone()).await?;
        log_tailer.start(token.clone()).await?;

        // The new scanner becomes visible to HTTP handlers only once every
        // dynamic collector in the set has successfully started.
        self.scanner_proxy.update(Some(Arc::clone(&path_scanner))).await;
        *guard = Some(DynamicCollectors { token, path_scanner, process_sampler, log_tailer });
        Ok(())
    }

    /// Stops every collector, static and dynamic, waiting for each to
    /// drain.
    pub async fn stop_all(&self) {
        let mut guard = self.dynamic.lock().await;
        if let Some(dynamic) = guard.take() {
            dynamic.stop().await;
        }
        self.scanner_proxy.update(None).await;
        self.fs_collector.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodeConfig, NodeSettings, PathConfig};

    fn test_config(tmp_path: &str) -> NodeConfig {
        NodeConfig {
            node: NodeSettings {
                listen: "127.0.0.1:0".to_string(),
                node_name: "test".to_string(),
                db_path: ":memory:".to_string(),
            },
            refresh: Default::default(),
            paths: vec![PathConfig {
                path: tmp_path.to_string(),
                scan_interval: Some(Duration::from_secs(3600)),
                max_depth: Some(1),
                exclude: vec![],
                timeout: Some(Duration::from_secs(5)),
            }],
            process: Default::default(),
            logs: vec![],
            aggregation: Default::default(),
        }
    }

    #[tokio::test]
    async fn start_all_publishes_a_scanner_through_the_proxy() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(":memory:").unwrap());
        let root = CancellationToken::new();
        let manager = CollectorManager::new(store, root.clone(), Duration::from_secs(3600));

        manager.start_all(&test_config(dir.path().to_str().unwrap())).await.unwrap();
        let proxy = manager.scanner_proxy();
        assert!(proxy.trigger_scan(&[]).await.is_ok());

        manager.stop_all().await;
        root.cancel();
    }

    #[tokio::test]
    async fn scan_before_start_all_reports_not_configured() {
        let store = Arc::new(Store::open(":memory:").unwrap());
        let root = CancellationToken::new();
        let manager = CollectorManager::new(store, root, Duration::from_secs(3600));

        let proxy = manager.scanner_proxy();
        let err = proxy.trigger_scan(&["/tmp".to_string()]).await.unwrap_err();
        assert!(matches!(err, CollectorError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn reload_swaps_in_a_new_scanner() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(":memory:").unwrap());
        let root = CancellationToken::new();
        let manager = CollectorManager::new(store, root.clone(), Duration::from_secs(3600));

        manager.start_all(&test_config(dir.path().to_str().unwrap())).await.unwrap();
        manager.reload(&test_config(dir.path().to_str().unwrap())).await.unwrap();

        let proxy = manager.scanner_proxy();
        assert!(proxy.trigger_scan(&[dir.path().to_str().unwrap().to_string()]).await.is_ok());

        manager.stop_all().await;
        root.cancel();
    }
}
