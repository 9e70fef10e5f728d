//! The Aggregation Kernel (C1): multi-window, multi-aggregation,
//! label-aware, wall-clock-aligned, emit-once-per-window. Ported from
//! `internal/aggregator/aggregator.go`'s `Aggregator`.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::functions;
use super::window::WindowBuffer;
use crate::model::{AggregationResult, Sample};

/// One buffer per configured window duration, guarded by a single lock --
/// `Add` and `CheckWindows` are mutually exclusive, matching spec.md §4.1's
/// "may collapse to one lock" note. This is a `std::sync::Mutex`, not a
/// `tokio::sync::Mutex`: neither critical section ever awaits while held.
pub struct AggregationKernel {
    buffers: Mutex<Vec<WindowBuffer>>,
    aggregations: Vec<String>,
}

impl AggregationKernel {
    pub fn new(windows: &[Duration], aggregations: Vec<String>) -> Self {
        let now = Utc::now();
        let buffers = windows.iter().map(|d| WindowBuffer::new(*d, now)).collect();
        Self {
            buffers: Mutex::new(buffers),
            aggregations,
        }
    }

    /// Appends `sample` to every configured window buffer under one
    /// exclusive lock, so a concurrent `check_windows` sees either
    /// all-before or all-after.
    pub fn add(&self, sample: Sample) {
        let mut buffers = self.buffers.lock().expect("aggregation kernel lock poisoned");
        for buf in buffers.iter_mut() {
            buf.add(sample.clone());
        }
    }

    /// Emits at most one result per (completed window, key, aggregation
    /// kind), then clears and rebases every completed buffer. Called at
    /// 1 Hz by the orchestrator loop.
    pub fn check_windows(&self, now: DateTime<Utc>) -> Vec<AggregationResult> {
        let mut buffers = self.buffers.lock().expect("aggregation kernel lock poisoned");
        let mut results = Vec::new();

        for buf in buffers.iter_mut() {
            if !buf.is_complete(now) {
                continue;
            }

            let window_end = buf.window_end();
            for key in buf.bucket_keys() {
                let values = buf.values_for(&key);
                if values.is_empty() {
                    continue;
                }
                for agg_name in &self.aggregations {
                    let Some(f) = functions::lookup(agg_name) else {
                        continue;
                    };
                    results.push(AggregationResult {
                        resource: key.resource.clone(),
                        metric: key.metric.clone(),
                        label_fingerprint: key.fingerprint.clone(),
                        window: buf.duration(),
                        aggregation: agg_name.clone(),
                        value: f(&values),
                        window_end,
                    });
                }
            }

            buf.reset(now);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample_at(value: f64) -> Sample {
        let mut s = Sample::new("cpu", "usage_percent", value);
        s.timestamp = Utc::now();
        s
    }

    #[test]
    fn one_window_emits_one_result_per_aggregation_kind() {
        let kernel = AggregationKernel::new(
            &[Duration::from_secs(60)],
            vec!["avg".into(), "max".into(), "min".into(), "last".into()],
        );
        for v in [10.0, 20.0, 30.0, 40.0, 50.0] {
            kernel.add(sample_at(v));
        }
        let results = kernel.check_windows(at(1_000_000_000) + chrono::Duration::hours(2));

        assert_eq!(results.len(), 4);
        let by_kind = |kind: &str| results.iter().find(|r| r.aggregation == kind).unwrap().value;
        assert_eq!(by_kind("avg"), 30.0);
        assert_eq!(by_kind("max"), 50.0);
        assert_eq!(by_kind("min"), 10.0);
        assert_eq!(by_kind("last"), 50.0);
    }

    #[test]
    fn labels_partition_into_distinct_buckets() {
        let kernel = AggregationKernel::new(&[Duration::from_millis(100)], vec!["avg".into()]);
        let now = Utc::now();

        let mut root_low = Sample::new("disk", "usage_percent", 50.0);
        root_low.labels.insert("mountpoint".into(), "/".into());
        root_low.timestamp = now;
        let mut root_high = Sample::new("disk", "usage_percent", 60.0);
        root_high.labels.insert("mountpoint".into(), "/".into());
        root_high.timestamp = now;
        let mut home_low = Sample::new("disk", "usage_percent", 70.0);
        home_low.labels.insert("mountpoint".into(), "/home".into());
        home_low.timestamp = now;
        let mut home_high = Sample::new("disk", "usage_percent", 80.0);
        home_high.labels.insert("mountpoint".into(), "/home".into());
        home_high.timestamp = now;

        for s in [root_low, root_high, home_low, home_high] {
            kernel.add(s);
        }

        let results = kernel.check_windows(now + chrono::Duration::seconds(1));
        assert_eq!(results.len(), 2);
        let values: std::collections::HashSet<_> =
            results.iter().map(|r| r.value as i64).collect();
        assert!(values.contains(&55));
        assert!(values.contains(&75));
    }

    #[test]
    fn incomplete_window_emits_nothing() {
        let kernel = AggregationKernel::new(&[Duration::from_secs(60)], vec!["avg".into()]);
        kernel.add(sample_at(10.0));
        let results = kernel.check_windows(Utc::now());
        assert!(results.is_empty());
    }

    #[test]
    fn each_completed_window_emits_exactly_once() {
        let kernel = AggregationKernel::new(&[Duration::from_millis(50)], vec!["avg".into()]);
        let now = Utc::now();
        kernel.add({
            let mut s = sample_at(10.0);
            s.timestamp = now;
            s
        });
        let later = now + chrono::Duration::milliseconds(60);
        let first = kernel.check_windows(later);
        let second = kernel.check_windows(later);
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }
}
