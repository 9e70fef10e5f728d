//! A single raw collected metric point and its label fingerprint.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// A raw sample fed into the aggregation kernel.
///
/// Timestamps are monotonic per collector, not across collectors. `value` has
/// no attached unit -- the unit is implied by `metric`.
#[derive(Debug, Clone)]
pub struct Sample {
    pub resource: String,
    pub metric: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub labels: BTreeMap<String, String>,
}

impl Sample {
    pub fn new(resource: impl Into<String>, metric: impl Into<String>, value: f64) -> Self {
        Self {
            resource: resource.into(),
            metric: metric.into(),
            value,
            timestamp: Utc::now(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Canonical textual encoding of `labels`: the stable JSON object with
    /// keys in sorted order (free, since `BTreeMap` already iterates sorted).
    /// An empty label set produces the empty string, not `"{}"`.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.labels)
    }
}

/// Two samples land in the same aggregation bucket iff they share
/// `(resource, metric, fingerprint(labels))`.
pub fn fingerprint(labels: &BTreeMap<String, String>) -> String {
    if labels.is_empty() {
        return String::new();
    }
    // BTreeMap serializes in key order, so this is already a stable encoding.
    serde_json::to_string(labels).expect("label map serialization is infallible")
}
