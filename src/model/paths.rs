//! Path Scanner output: one row per configured path per scan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathStats {
    pub path: String,
    pub file_count: i64,
    pub dir_count: i64,
    pub scan_duration_ms: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub collected_at: DateTime<Utc>,
}
