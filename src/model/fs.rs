//! Filesystem Usage collector output, persisted verbatim each tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemUsage {
    pub mount_point: String,
    pub total_bytes: i64,
    pub used_bytes: i64,
    pub avail_bytes: i64,
    pub used_percent: f64,
    pub collected_at: DateTime<Utc>,
}
