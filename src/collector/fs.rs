//! The Filesystem Usage collector (C3): samples every non-pseudo mount
//! point on a fixed interval and replaces the store's snapshot wholesale.
//! Ported from `internal/collector/disk/collector.go`, trading the
//! original's `syscall.Statfs` + hand-maintained mount list for
//! `sysinfo`'s disk enumeration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{DiskExt, System, SystemExt};
use tokio_util::sync::CancellationToken;

use crate::collector::support::TaskHandle;
use crate::collector::Collector;
use crate::error::CollectorError;
use crate::model::FilesystemUsage;
use crate::storage::Store;

const PSEUDO_FS_TYPES: &[&str] = &[
    "tmpfs", "devtmpfs", "sysfs", "proc", "overlay", "squashfs", "aufs", "debugfs", "cgroup",
    "cgroup2", "pstore", "bpf", "tracefs", "hugetlbfs", "mqueue", "fusectl", "configfs",
    "efivarfs", "nsfs", "devpts", "securityfs", "autofs",
];

fn is_pseudo_fs(fstype: &str) -> bool {
    PSEUDO_FS_TYPES.contains(&fstype)
}

/// Collects usage for every mounted, non-pseudo filesystem and overwrites
/// `filesystem_usage` each tick.
pub struct FsUsageCollector {
    store: Arc<Store>,
    interval: Duration,
    task: TaskHandle,
}

impl FsUsageCollector {
    pub fn new(store: Arc<Store>, interval: Duration) -> Self {
        Self { store, interval, task: TaskHandle::new("fs-usage") }
    }

    async fn collect_once(store: &Arc<Store>) {
        let store = Arc::clone(store);
        let rows = tokio::task::spawn_blocking(move || {
            let mut sys = System::new();
            sys.refresh_disks_list();
            sys.refresh_disks();

            let mut rows = Vec::new();
            for disk in sys.disks() {
                let fstype = String::from_utf8_lossy(disk.file_system()).to_string();
                if is_pseudo_fs(&fstype) {
                    continue;
                }
                let total = disk.total_space() as i64;
                let available = disk.available_space() as i64;
                let used = total - available;
                let used_percent = if total > 0 { used as f64 / total as f64 * 100.0 } else { 0.0 };

                rows.push(FilesystemUsage {
                    mount_point: disk.mount_point().to_string_lossy().to_string(),
                    total_bytes: total,
                    used_bytes: used,
                    avail_bytes: available,
                    used_percent,
                    collected_at: chrono::Utc::now(),
                });
            }
            rows
        })
        .await
        .unwrap_or_default();

        if let Err(err) = store.save_fs_usage(&rows) {
            tracing::warn!(error = %err, "failed to save filesystem usage");
        }
    }
}

#[async_trait]
impl Collector for FsUsageCollector {
    fn name(&self) -> &str {
        "fs-usage"
    }

    async fn start(&self, parent: CancellationToken) -> Result<(), CollectorError> {
        let token = self.task.start(parent)?;
        let store = Arc::clone(&self.store);
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            Self::collect_once(&store).await;

            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => Self::collect_once(&store).await,
                }
            }
        });
        self.task.set_handle(handle);
        Ok(())
    }

    async fn stop(&self) {
        self.task.stop().await;
    }
}
