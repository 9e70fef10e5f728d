//! The collector fleet (C3-C6): a shared `Collector` runtime contract plus
//! one module per concrete collector.

mod fs;
mod log_tailer;
mod path;
mod process;
mod raw;
mod support;

pub use fs::FsUsageCollector;
pub use log_tailer::LogTailer;
pub use path::{PathScanner, ScanPaths};
pub use process::ProcessSampler;
pub use raw::RawMetricsManager;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::CollectorError;

/// Every periodic worker in the fleet: an independent cadence, its own
/// cancellation, and re-entrancy guards against a double `start`.
///
/// `start` is rejected if the collector is already running. `stop` blocks
/// until the worker's current tick (if any) has finished -- "a single
/// collection invocation is not pre-empted" (spec.md §4.2).
#[async_trait]
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;
    async fn start(&self, parent: CancellationToken) -> Result<(), CollectorError>;
    async fn stop(&self);
}
