//! Node configuration: YAML shape, defaulting, and validation.
//!
//! Mirrors `internal/config/node.go`'s `LoadNodeConfig` /
//! `applyNodeDefaults` / `ValidateNodeConfig` from the original Go
//! source, folded into one pass since this crate runs collectors and
//! the aggregator in a single process.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_db_path() -> String {
    "./etlmon.db".to_string()
}

fn default_disk_refresh() -> Duration {
    Duration::from_secs(15)
}

fn default_path_scan_refresh() -> Duration {
    Duration::from_secs(60)
}

fn default_process_refresh() -> Duration {
    Duration::from_secs(10)
}

fn default_log_refresh() -> Duration {
    Duration::from_secs(2)
}

fn default_max_depth() -> u32 {
    10
}

fn default_path_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_top_n() -> usize {
    50
}

fn default_max_lines() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_resources() -> Vec<String> {
    vec!["cpu".to_string(), "memory".to_string(), "disk".to_string()]
}

fn default_windows() -> Vec<Duration> {
    vec![Duration::from_secs(60)]
}

fn default_aggregations() -> Vec<String> {
    vec![
        "avg".to_string(),
        "max".to_string(),
        "min".to_string(),
        "last".to_string(),
    ]
}

fn default_sample_interval() -> Duration {
    Duration::from_secs(5)
}

/// The full node configuration: `node`/`refresh`/`paths`/`process`/`logs`,
/// plus the `aggregation` section folded in from the original `cmd/etlmon`
/// aggregator config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSettings,
    #[serde(default)]
    pub refresh: RefreshSettings,
    #[serde(default)]
    pub paths: Vec<PathConfig>,
    #[serde(default)]
    pub process: ProcessSettings,
    #[serde(default)]
    pub logs: Vec<LogConfig>,
    #[serde(default)]
    pub aggregation: AggregationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSettings {
    #[serde(default = "default_disk_refresh", with = "humantime_serde")]
    pub disk: Duration,
    #[serde(default = "default_path_scan_refresh", with = "humantime_serde")]
    pub default_path_scan: Duration,
    #[serde(default = "default_process_refresh", with = "humantime_serde")]
    pub process: Duration,
    #[serde(default = "default_log_refresh", with = "humantime_serde")]
    pub log: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            disk: default_disk_refresh(),
            default_path_scan: default_path_scan_refresh(),
            process: default_process_refresh(),
            log: default_log_refresh(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    pub path: String,
    #[serde(default, with = "humantime_serde::option")]
    pub scan_interval: Option<Duration>,
    /// `None` defaults to 10. `Some(0)` means "the root's direct children
    /// only", not unlimited -- see DESIGN.md for why this crate resolves
    /// the original's ambiguous `max_depth == 0` sentinel this way.
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default, with = "humantime_serde::option")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSettings {
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            top_n: default_top_n(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub name: String,
    pub path: String,
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// `true` (default) reads the file from byte 0 on first start, to
    /// capture pre-existing content, matching the original Go tailer's
    /// behavior. `false` seeks to current EOF at startup instead, giving
    /// the more conventional "tail -f" semantics the spec flags as a
    /// surprising default to silently copy (see spec.md §9).
    #[serde(default = "default_true")]
    pub read_from_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationSettings {
    #[serde(default = "default_resources")]
    pub resources: Vec<String>,
    #[serde(default = "default_windows", with = "humantime_duration_vec")]
    pub windows: Vec<Duration>,
    #[serde(default = "default_aggregations")]
    pub aggregations: Vec<String>,
    /// Cadence of the raw cpu/memory/disk sample pipeline feeding the
    /// aggregation kernel -- folded in from the original `cmd/etlmon`
    /// aggregator config's top-level `interval` field (`internal/config/config.go`).
    #[serde(default = "default_sample_interval", with = "humantime_serde")]
    pub sample_interval: Duration,
}

/// `humantime_serde` only ships `Duration` and `Option<Duration>` adapters;
/// this fills the `Vec<Duration>` gap for `aggregation.windows` so the YAML
/// can keep using literal `"1m"`/`"30s"` entries like the rest of the file.
mod humantime_duration_vec {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(values: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let strings: Vec<String> = values
            .iter()
            .map(|d| humantime::format_duration(*d).to_string())
            .collect();
        strings.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .collect()
    }
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            resources: default_resources(),
            windows: default_windows(),
            aggregations: default_aggregations(),
            sample_interval: default_sample_interval(),
        }
    }
}

const KNOWN_RESOURCES: &[&str] = &["cpu", "memory", "disk"];
const KNOWN_AGGREGATIONS: &[&str] = &["avg", "max", "min", "last"];

impl NodeConfig {
    /// Reads, parses, defaults, and validates a config file in one pass,
    /// matching `LoadNodeConfig`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut cfg: NodeConfig = serde_yaml::from_str(&text)?;
        cfg.apply_path_defaults();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses an in-memory YAML document the same way `load` does,
    /// without touching the filesystem -- used by `PUT /api/v1/config`.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let mut cfg: NodeConfig = serde_yaml::from_str(text)?;
        cfg.apply_path_defaults();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = self.to_yaml_string()?;
        fs::write(path.as_ref(), text).map_err(|source| ConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })
    }

    /// Applies per-path defaulting and validates in one pass -- the same
    /// two steps `load`/`from_yaml_str` run after parsing, exposed for
    /// `PUT /api/v1/config`, which receives an already-deserialized
    /// `NodeConfig` (JSON, not YAML) straight from the request body.
    pub fn apply_defaults_and_validate(&mut self) -> Result<(), ConfigError> {
        self.apply_path_defaults();
        self.validate()
    }

    /// Fills in per-path fields left unset, mirroring `applyNodeDefaults`'s
    /// path loop: `scan_interval` inherits `refresh.default_path_scan`,
    /// `max_depth` defaults to 10, `timeout` to 30s.
    fn apply_path_defaults(&mut self) {
        let default_interval = self.refresh.default_path_scan;
        for path in &mut self.paths {
            if path.scan_interval.is_none() {
                path.scan_interval = Some(default_interval);
            }
            if path.max_depth.is_none() {
                path.max_depth = Some(default_max_depth());
            }
            if path.timeout.is_none() {
                path.timeout = Some(default_path_timeout());
            }
        }
    }

    /// Mirrors `ValidateNodeConfig`, plus the `aggregation` section the
    /// original split into a separate `cmd/etlmon` config loader.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.node.node_name.trim().is_empty() {
            return Err(ConfigError::Invalid("node_name is required".to_string()));
        }
        if self.node.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "node.listen is not a valid address: {}",
                self.node.listen
            )));
        }
        if self.paths.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one path must be configured".to_string(),
            ));
        }
        for (i, path) in self.paths.iter().enumerate() {
            if path.path.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("paths[{i}]: path is required")));
            }
        }
        for (i, log) in self.logs.iter().enumerate() {
            if log.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("logs[{i}]: name is required")));
            }
            if log.path.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("logs[{i}]: path is required")));
            }
        }
        for resource in &self.aggregation.resources {
            if !KNOWN_RESOURCES.contains(&resource.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "aggregation.resources: unknown resource {resource:?}"
                )));
            }
        }
        for agg in &self.aggregation.aggregations {
            if !KNOWN_AGGREGATIONS.contains(&agg.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "aggregation.aggregations: unknown aggregation {agg:?}"
                )));
            }
        }
        if self.aggregation.windows.is_empty() {
            return Err(ConfigError::Invalid(
                "aggregation.windows must not be empty".to_string(),
            ));
        }
        if self.aggregation.sample_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "aggregation.sample_interval must be a positive duration".to_string(),
            ));
        }
        for window in &self.aggregation.windows {
            if window.is_zero() {
                return Err(ConfigError::Invalid(
                    "aggregation.windows entries must be positive durations".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
node:
  node_name: test-node
paths:
  - path: /tmp
"#
    }

    #[test]
    fn defaults_fill_unset_fields() {
        let cfg = NodeConfig::from_yaml_str(minimal_yaml()).unwrap();
        assert_eq!(cfg.node.listen, "0.0.0.0:8080");
        assert_eq!(cfg.node.db_path, "./etlmon.db");
        assert_eq!(cfg.refresh.disk, Duration::from_secs(15));
        assert_eq!(cfg.paths[0].max_depth, Some(10));
        assert_eq!(cfg.paths[0].timeout, Some(Duration::from_secs(30)));
        assert_eq!(cfg.process.top_n, 50);
        assert_eq!(cfg.aggregation.windows, vec![Duration::from_secs(60)]);
    }

    #[test]
    fn explicit_max_depth_zero_is_preserved_not_defaulted() {
        let yaml = r#"
node:
  node_name: test-node
paths:
  - path: /tmp
    max_depth: 0
"#;
        let cfg = NodeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.paths[0].max_depth, Some(0));
    }

    #[test]
    fn missing_node_name_is_rejected() {
        let yaml = r#"
node: {}
paths:
  - path: /tmp
"#;
        let err = NodeConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_paths_is_rejected() {
        let yaml = r#"
node:
  node_name: test-node
"#;
        let err = NodeConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_aggregation_kind_is_rejected() {
        let yaml = r#"
node:
  node_name: test-node
paths:
  - path: /tmp
aggregation:
  aggregations: [avg, bogus]
"#;
        let err = NodeConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn path_scan_interval_inherits_refresh_default() {
        let yaml = r#"
node:
  node_name: test-node
refresh:
  default_path_scan: 5m
paths:
  - path: /tmp
"#;
        let cfg = NodeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.paths[0].scan_interval, Some(Duration::from_secs(300)));
    }
}
