//! A single tumbling window's sample buffer, ported from
//! `internal/aggregator/window.go`'s `MetricBuffer`.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::model::Sample;

/// Truncates `now` to the most recent multiple of `duration` since the Unix
/// epoch -- windows are wall-clock-aligned, never process-start-aligned.
pub fn truncate(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    let step_ms = duration.as_millis().max(1) as i64;
    let now_ms = now.timestamp_millis();
    let truncated_ms = now_ms - now_ms.rem_euclid(step_ms);
    Utc.timestamp_millis_opt(truncated_ms).single().unwrap_or(now)
}

/// Identifies a unique (resource, metric, label-fingerprint) aggregation
/// bucket within one window buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub resource: String,
    pub metric: String,
    pub fingerprint: String,
}

/// One window's worth of raw samples, in insertion order. Never destroyed;
/// cleared and rebased on emission.
pub struct WindowBuffer {
    duration: Duration,
    window_start: DateTime<Utc>,
    samples: Vec<Sample>,
}

impl WindowBuffer {
    pub fn new(duration: Duration, now: DateTime<Utc>) -> Self {
        Self {
            duration,
            window_start: truncate(now, duration),
            samples: Vec::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    pub fn window_end(&self) -> DateTime<Utc> {
        self.window_start
            + chrono::Duration::from_std(self.duration).unwrap_or(chrono::Duration::zero())
    }

    pub fn is_complete(&self, now: DateTime<Utc>) -> bool {
        now >= self.window_end()
    }

    pub fn add(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Distinct (resource, metric, fingerprint) keys present, in first-seen
    /// order -- a `Vec` scan rather than a `HashMap` so emission order is no
    /// less deterministic than the samples' own insertion order.
    pub fn bucket_keys(&self) -> Vec<BucketKey> {
        let mut seen = std::collections::HashSet::new();
        let mut keys = Vec::new();
        for s in &self.samples {
            let key = BucketKey {
                resource: s.resource.clone(),
                metric: s.metric.clone(),
                fingerprint: s.fingerprint(),
            };
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        keys
    }

    /// Values for one bucket, in the chronological insertion order samples
    /// were added -- required for "last" to be correct.
    pub fn values_for(&self, key: &BucketKey) -> Vec<f64> {
        self.samples
            .iter()
            .filter(|s| {
                s.resource == key.resource && s.metric == key.metric && s.fingerprint() == key.fingerprint
            })
            .map(|s| s.value)
            .collect()
    }

    /// Clears the buffer and rebases its window start to `truncate(now, D)`.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.window_start = truncate(now, self.duration);
        self.samples.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn truncate_rounds_down_to_window_boundary() {
        let d = Duration::from_secs(60);
        assert_eq!(truncate(at(125), d), at(120));
        assert_eq!(truncate(at(120), d), at(120));
    }

    #[test]
    fn window_is_complete_at_or_after_end() {
        let buf = WindowBuffer::new(Duration::from_secs(60), at(120));
        assert!(!buf.is_complete(at(150)));
        assert!(buf.is_complete(at(180)));
        assert!(buf.is_complete(at(181)));
    }

    #[test]
    fn add_appends_exactly_one_copy() {
        let mut buf = WindowBuffer::new(Duration::from_secs(60), at(0));
        buf.add(Sample::new("cpu", "usage_percent", 1.0));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn reset_clears_and_rebases_window_start() {
        let mut buf = WindowBuffer::new(Duration::from_secs(60), at(0));
        buf.add(Sample::new("cpu", "usage_percent", 1.0));
        buf.reset(at(185));
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.window_start(), at(180));
    }
}
