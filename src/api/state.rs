//! Application state shared across every HTTP handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};

use crate::config::NodeConfig;
use crate::manager::ScannerProxy;
use crate::storage::Store;

/// Everything a handler needs: the store for reads, the scanner proxy for
/// `/paths/scan`, the current config (read by `GET /config`, replaced by
/// `PUT /config`), and a channel that hands a freshly validated config to
/// the orchestrator's reload loop.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub scanner: Arc<ScannerProxy>,
    pub config: Arc<RwLock<NodeConfig>>,
    pub config_path: Arc<String>,
    pub reload_tx: mpsc::Sender<NodeConfig>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn uptime_seconds(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
