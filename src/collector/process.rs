//! The Process Sampler (C6): snapshots the OS process table, filters it
//! against configured patterns, truncates to the top N, and replaces the
//! store's process-stats row set atomically each tick. Ported from
//! `internal/collector/process/sampler.go`'s `ProcessSampler`, trading its
//! shelled-out `ps` invocation for `sysinfo::System::refresh_processes`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use sysinfo::{PidExt, ProcessExt, System, SystemExt, UserExt};
use tokio_util::sync::CancellationToken;

use crate::collector::support::TaskHandle;
use crate::error::CollectorError;
use crate::model::ProcessInfo;
use crate::storage::Store;

/// Maps the first character of an OS-reported process state to the
/// spec's five-way classification.
fn classify_state(state: &str) -> &'static str {
    match state.chars().next() {
        Some('R') => "running",
        Some('S') | Some('I') => "sleeping",
        Some('D') => "disk-wait",
        Some('Z') => "zombie",
        Some('T') => "stopped",
        Some(_) => "other",
        None => "unknown",
    }
}

/// Formats a run-time in seconds as `ps`-style `HH:MM:SS` elapsed text.
fn format_elapsed(run_time_secs: u64) -> String {
    let hours = run_time_secs / 3600;
    let minutes = (run_time_secs % 3600) / 60;
    let seconds = run_time_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Compiles one configured filter pattern into a regex per spec.md §4.5:
/// a pattern containing `*` or `?` becomes an anchored regex (`*` -> `.*`,
/// `?` -> `.`, everything else escaped); a pattern with no glob characters
/// becomes a case-insensitive unanchored substring match.
fn compile_pattern(pattern: &str) -> Option<Regex> {
    if pattern.contains('*') || pattern.contains('?') {
        let mut expr = String::from("^");
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                c => expr.push_str(&regex::escape(&c.to_string())),
            }
        }
        expr.push('$');
        Regex::new(&expr).ok()
    } else {
        Regex::new(&format!("(?i){}", regex::escape(pattern))).ok()
    }
}

/// Samples the process table on a fixed interval, optionally filtering
/// by name and always capping to `top_n`, then replaces the store's
/// entire process snapshot in one transaction.
pub struct ProcessSampler {
    store: Arc<Store>,
    interval: Duration,
    patterns: Vec<Regex>,
    top_n: usize,
    task: TaskHandle,
}

impl ProcessSampler {
    pub fn new(store: Arc<Store>, interval: Duration, patterns: &[String], top_n: usize) -> Self {
        let patterns = patterns.iter().filter_map(|p| compile_pattern(p)).collect();
        Self { store, interval, patterns, top_n, task: TaskHandle::new("process-sampler") }
    }

    fn matches(&self, name: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|re| re.is_match(name))
    }

    async fn collect_once(&self) {
        let store = Arc::clone(&self.store);
        let patterns_empty = self.patterns.is_empty();
        // `Regex` isn't `Sync`-cheap to clone into the blocking task, so the
        // match predicate runs inline on `self` before spawning the
        // filtering/top-N step, keeping only plain data crossing the boundary.
        let snapshot = tokio::task::spawn_blocking(move || {
            let mut sys = System::new();
            sys.refresh_users_list();
            sys.refresh_processes();

            let mut rows = Vec::new();
            for (pid, process) in sys.processes() {
                let user = process
                    .user_id()
                    .and_then(|uid| sys.get_user_by_id(uid))
                    .map(|u| u.name().to_string())
                    .unwrap_or_else(|| "unknown".to_string());

                rows.push(ProcessInfo {
                    pid: pid.as_u32() as i64,
                    name: process.name().to_string(),
                    user,
                    cpu_percent: process.cpu_usage() as f64,
                    mem_rss: process.memory() as i64,
                    status: classify_state(&process.status().to_string()).to_string(),
                    elapsed: format_elapsed(process.run_time()),
                    collected_at: Utc::now(),
                });
            }
            rows
        })
        .await
        .unwrap_or_default();

        let filtered: Vec<ProcessInfo> = if patterns_empty {
            snapshot
        } else {
            snapshot.into_iter().filter(|p| self.matches(&p.name)).collect()
        };

        // Top-N in original OS-reported order, no sort -- the sort-by-CPU
        // presentation lives in `Store::list_processes`, not here.
        let truncated: Vec<ProcessInfo> = filtered.into_iter().take(self.top_n).collect();

        if let Err(err) = store.replace_process_snapshot(&truncated) {
            tracing::warn!(error = %err, "failed to save process snapshot");
        }
    }
}

impl ProcessSampler {
    pub fn name(&self) -> &str {
        "process-sampler"
    }

    /// Unlike the other collectors, which are driven through `&self` (see
    /// `super::Collector`), this sampler's tick loop needs an owned handle
    /// to itself, so callers hold it behind an `Arc` and start it through
    /// this method instead of the shared trait.
    pub async fn start(
        self: &Arc<Self>,
        parent: CancellationToken,
    ) -> Result<(), CollectorError> {
        let token = self.task.start(parent)?;
        let sampler = Arc::clone(self);
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            sampler.collect_once().await;

            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => sampler.collect_once().await,
                }
            }
        });
        self.task.set_handle(handle);
        Ok(())
    }

    pub async fn stop(&self) {
        self.task.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_state_maps_first_character() {
        assert_eq!(classify_state("Run"), "running");
        assert_eq!(classify_state("Sleep"), "sleeping");
        assert_eq!(classify_state("Idle"), "sleeping");
        assert_eq!(classify_state("Disk sleep"), "disk-wait");
        assert_eq!(classify_state("Zombie"), "zombie");
        assert_eq!(classify_state("Stop"), "stopped");
        assert_eq!(classify_state("Dead"), "other");
        assert_eq!(classify_state(""), "unknown");
    }

    #[test]
    fn glob_pattern_compiles_to_anchored_regex() {
        let re = compile_pattern("nginx*").unwrap();
        assert!(re.is_match("nginx-worker"));
        assert!(!re.is_match("my-nginx"));
    }

    #[test]
    fn plain_pattern_is_case_insensitive_substring() {
        let re = compile_pattern("nginx").unwrap();
        assert!(re.is_match("NGINX-worker"));
        assert!(re.is_match("my-nginx-proc"));
    }

    #[test]
    fn glob_metacharacters_in_literal_segments_are_escaped() {
        let re = compile_pattern("a.b*").unwrap();
        assert!(re.is_match("a.bcd"));
        assert!(!re.is_match("axbcd"));
    }

    #[test]
    fn no_patterns_means_everything_matches() {
        let sampler = ProcessSampler::new(
            Arc::new(Store::open(":memory:").unwrap()),
            Duration::from_secs(10),
            &[],
            50,
        );
        assert!(sampler.matches("anything"));
    }

    #[test]
    fn any_pattern_matching_is_sufficient() {
        let sampler = ProcessSampler::new(
            Arc::new(Store::open(":memory:").unwrap()),
            Duration::from_secs(10),
            &["sshd".to_string(), "nginx*".to_string()],
            50,
        );
        assert!(sampler.matches("sshd"));
        assert!(sampler.matches("nginx-worker"));
        assert!(!sampler.matches("cron"));
    }

    #[test]
    fn elapsed_formats_as_hh_mm_ss() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(3725), "01:02:05");
    }
}
