//! Process Sampler output: one row per sampled process per tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: i64,
    pub name: String,
    pub user: String,
    pub cpu_percent: f64,
    pub mem_rss: i64,
    pub status: String,
    pub elapsed: String,
    pub collected_at: DateTime<Utc>,
}
