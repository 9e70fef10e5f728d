//! Aggregation Kernel output: one record per (window instance, key, aggregation kind).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub resource: String,
    pub metric: String,
    pub label_fingerprint: String,
    pub window: Duration,
    pub aggregation: String,
    pub value: f64,
    pub window_end: DateTime<Utc>,
}
