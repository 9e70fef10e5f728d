//! The raw-metric `Manager` (cpu/memory/disk -> aggregator), ported from
//! `internal/collector/collector.go`'s `Manager` and the per-resource
//! `CPUCollector`/`MemoryCollector`/`DiskCollector`.
//!
//! This is a distinct, narrower type from the [`super::Collector`] trait:
//! it owns its own ticker loop and calls a caller-supplied handler with
//! each tick's batch, matching `cmd/etlmon/main.go`'s
//! `select { metricsChan <- metrics: default: }` discard-on-full
//! backpressure policy.

use std::sync::Mutex;
use std::time::Duration;

use sysinfo::{CpuExt, DiskExt, System, SystemExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::CollectorError;
use crate::model::Sample;

const PSEUDO_FS_TYPES: &[&str] = &[
    "tmpfs", "devtmpfs", "sysfs", "proc", "overlay", "squashfs", "aufs", "debugfs", "cgroup",
    "cgroup2", "pstore", "bpf", "tracefs", "hugetlbfs", "mqueue", "fusectl", "configfs",
    "efivarfs", "nsfs", "devpts", "securityfs", "autofs",
];

fn is_pseudo_fs(fstype: &str) -> bool {
    PSEUDO_FS_TYPES.contains(&fstype)
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Samples cpu/memory/disk at a fixed cadence and hands each batch to a
/// caller-supplied handler, dropping the batch if the handler's channel
/// is full. Which resources are sampled is driven by
/// `aggregation.resources` in the node config.
pub struct RawMetricsManager {
    interval: Duration,
    resources: Vec<String>,
    running: Mutex<Option<Running>>,
}

impl RawMetricsManager {
    pub fn new(interval: Duration, resources: Vec<String>) -> Self {
        Self {
            interval,
            resources,
            running: Mutex::new(None),
        }
    }

    /// Starts the ticker loop: an immediate tick on start, then a tick
    /// every `interval`, feeding `tx` with `try_send` (discard-newest on a
    /// full channel) until `parent` is cancelled.
    pub fn start(
        self: std::sync::Arc<Self>,
        parent: CancellationToken,
        tx: mpsc::Sender<Vec<Sample>>,
    ) -> Result<(), CollectorError> {
        let mut guard = self.running.lock().expect("raw metrics manager lock poisoned");
        if guard.is_some() {
            return Err(CollectorError::AlreadyStarted("raw-metrics".to_string()));
        }
        let token = parent.child_token();
        let manager = std::sync::Arc::clone(&self);
        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            manager.run(loop_token, tx).await;
        });
        *guard = Some(Running { token, handle });
        Ok(())
    }

    pub async fn stop(&self) {
        let running = self.running.lock().expect("raw metrics manager lock poisoned").take();
        if let Some(running) = running {
            running.token.cancel();
            let _ = running.handle.await;
        }
    }

    async fn run(&self, token: CancellationToken, tx: mpsc::Sender<Vec<Sample>>) {
        let mut ticker = tokio::time::interval(self.interval);
        // `interval` fires its first tick immediately; consume that one up
        // front so the loop below's ticks are spaced a full `interval`
        // apart, matching the original's `time.NewTicker` + explicit
        // initial `CollectOnce` shape.
        ticker.tick().await;

        loop {
            let batch = self.collect_once().await;
            if !batch.is_empty() {
                if tx.try_send(batch).is_err() {
                    tracing::warn!("raw metrics channel full, dropping batch");
                }
            }

            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }
        }
    }

    async fn collect_once(&self) -> Vec<Sample> {
        let resources = self.resources.clone();
        tokio::task::spawn_blocking(move || {
            let mut samples = Vec::new();
            let mut sys = System::new();

            if resources.iter().any(|r| r == "cpu") {
                sys.refresh_cpu();
                std::thread::sleep(Duration::from_millis(200));
                sys.refresh_cpu();
                let cpus = sys.cpus();
                if !cpus.is_empty() {
                    let total: f32 = cpus.iter().map(|c| c.cpu_usage()).sum();
                    let avg = total / cpus.len() as f32;
                    samples.push(Sample::new("cpu", "usage_percent", avg as f64));
                }
            }

            if resources.iter().any(|r| r == "memory") {
                sys.refresh_memory();
                let total = sys.total_memory() as f64;
                let used = sys.used_memory() as f64;
                let available = sys.available_memory() as f64;
                let used_percent = if total > 0.0 { used / total * 100.0 } else { 0.0 };
                samples.push(Sample::new("memory", "usage_percent", used_percent));
                samples.push(Sample::new("memory", "used_bytes", used));
                samples.push(Sample::new("memory", "available_bytes", available));
                samples.push(Sample::new("memory", "total_bytes", total));
            }

            if resources.iter().any(|r| r == "disk") {
                sys.refresh_disks_list();
                sys.refresh_disks();
                for disk in sys.disks() {
                    let fstype = String::from_utf8_lossy(disk.file_system()).to_string();
                    if is_pseudo_fs(&fstype) {
                        continue;
                    }
                    let mountpoint = disk.mount_point().to_string_lossy().to_string();
                    let total = disk.total_space() as f64;
                    let available = disk.available_space() as f64;
                    let used = total - available;
                    let used_percent = if total > 0.0 { used / total * 100.0 } else { 0.0 };

                    let mut labels = std::collections::BTreeMap::new();
                    labels.insert("mountpoint".to_string(), mountpoint);

                    samples.push(
                        Sample::new("disk", "usage_percent", used_percent).with_labels(labels.clone()),
                    );
                    samples.push(Sample::new("disk", "used_bytes", used).with_labels(labels.clone()));
                    samples.push(Sample::new("disk", "total_bytes", total).with_labels(labels));
                }
            }

            samples
        })
        .await
        .unwrap_or_default()
    }
}
