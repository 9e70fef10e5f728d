//! `GET /api/v1/health` response body.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub status: &'static str,
    pub node_name: String,
    pub uptime_seconds: f64,
    pub timestamp: DateTime<Utc>,
}
