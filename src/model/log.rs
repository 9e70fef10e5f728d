//! Log Tailer output: one row per new line read, plus the tailed-file summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub log_name: String,
    pub log_path: String,
    pub line: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileInfo {
    pub name: String,
    pub path: String,
    pub max_lines: i64,
    pub size: i64,
    pub mod_time: DateTime<Utc>,
}
