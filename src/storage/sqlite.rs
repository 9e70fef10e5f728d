//! `rusqlite`-backed implementation of the embedded store.
//!
//! Every method is synchronous -- callers already run on the async
//! runtime wrap calls in `tokio::task::spawn_blocking` (the store is a
//! single WAL-mode connection behind one mutex; it is not meant to be
//! called directly from an async context without yielding the thread).

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StorageError;
use crate::model::{AggregationResult, FilesystemUsage, LogEntry, PathStats, ProcessInfo};

const SCHEMA_VERSION: &str = "1";

const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS filesystem_usage (
    mount_point  TEXT PRIMARY KEY,
    total_bytes  INTEGER NOT NULL,
    used_bytes   INTEGER NOT NULL,
    avail_bytes  INTEGER NOT NULL,
    used_percent REAL NOT NULL,
    collected_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS path_stats (
    path             TEXT PRIMARY KEY,
    file_count       INTEGER NOT NULL,
    dir_count        INTEGER NOT NULL,
    scan_duration_ms INTEGER NOT NULL,
    status           TEXT NOT NULL,
    error_message    TEXT,
    collected_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS process_stats (
    pid          INTEGER PRIMARY KEY,
    name         TEXT NOT NULL,
    user         TEXT NOT NULL,
    cpu_percent  REAL NOT NULL,
    mem_rss      INTEGER NOT NULL,
    status       TEXT NOT NULL,
    elapsed      TEXT NOT NULL,
    collected_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS log_lines (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    log_name     TEXT NOT NULL,
    log_path     TEXT NOT NULL,
    line         TEXT NOT NULL,
    created_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_log_lines_name_id ON log_lines (log_name, id DESC);

CREATE TABLE IF NOT EXISTS aggregated_metrics (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    resource_type     TEXT NOT NULL,
    metric_name       TEXT NOT NULL,
    label_fingerprint TEXT NOT NULL,
    window_seconds    INTEGER NOT NULL,
    aggregation_type  TEXT NOT NULL,
    value             REAL NOT NULL,
    window_end        TEXT NOT NULL
);
"#;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if absent) the database at `path` in WAL mode and
    /// runs migrations.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute_batch(SCHEMA_DDL)?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store lock poisoned")
    }

    // -- filesystem usage ---------------------------------------------

    pub fn save_fs_usage(&self, rows: &[FilesystemUsage]) -> Result<(), StorageError> {
        let conn = self.conn();
        for row in rows {
            conn.execute(
                "INSERT OR REPLACE INTO filesystem_usage
                 (mount_point, total_bytes, used_bytes, avail_bytes, used_percent, collected_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    row.mount_point,
                    row.total_bytes,
                    row.used_bytes,
                    row.avail_bytes,
                    row.used_percent,
                    row.collected_at.to_rfc3339(),
                ],
            )?;
        }
        Ok(())
    }

    pub fn list_fs_usage(&self) -> Result<Vec<FilesystemUsage>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT mount_point, total_bytes, used_bytes, avail_bytes, used_percent, collected_at
             FROM filesystem_usage ORDER BY mount_point",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(FilesystemUsage {
                mount_point: r.get(0)?,
                total_bytes: r.get(1)?,
                used_bytes: r.get(2)?,
                avail_bytes: r.get(3)?,
                used_percent: r.get(4)?,
                collected_at: parse_timestamp(r.get::<_, String>(5)?),
            })
        })?;
        rows.collect::<Result<_, _>>().map_err(StorageError::from)
    }

    // -- path stats ------------------------------------------------------

    pub fn save_path_stats(&self, stats: &PathStats) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO path_stats
             (path, file_count, dir_count, scan_duration_ms, status, error_message, collected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                stats.path,
                stats.file_count,
                stats.dir_count,
                stats.scan_duration_ms,
                stats.status,
                stats.error_message,
                stats.collected_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Returns `(rows, total_count)`. `limit = None` returns every row
    /// unpaginated, with `total_count` equal to the number of rows
    /// returned.
    pub fn list_path_stats(
        &self,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<(Vec<PathStats>, i64), StorageError> {
        let conn = self.conn();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM path_stats", [], |r| r.get(0))?;

        let map_row = |r: &rusqlite::Row| -> rusqlite::Result<PathStats> {
            Ok(PathStats {
                path: r.get(0)?,
                file_count: r.get(1)?,
                dir_count: r.get(2)?,
                scan_duration_ms: r.get(3)?,
                status: r.get(4)?,
                error_message: r.get(5)?,
                collected_at: parse_timestamp(r.get::<_, String>(6)?),
            })
        };

        let rows = match limit {
            Some(limit) => {
                let mut stmt = conn.prepare(
                    "SELECT path, file_count, dir_count, scan_duration_ms, status, error_message, collected_at
                     FROM path_stats ORDER BY path LIMIT ?1 OFFSET ?2",
                )?;
                stmt.query_map(params![limit, offset], map_row)?
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT path, file_count, dir_count, scan_duration_ms, status, error_message, collected_at
                     FROM path_stats ORDER BY path",
                )?;
                stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok((rows, total))
    }

    // -- process snapshot --------------------------------------------

    /// Clears all existing process rows then inserts the new set inside
    /// one transaction, so the store never shows a mix of two snapshots.
    pub fn replace_process_snapshot(&self, rows: &[ProcessInfo]) -> Result<(), StorageError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM process_stats", [])?;
        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO process_stats
                 (pid, name, user, cpu_percent, mem_rss, status, elapsed, collected_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.pid,
                    row.name,
                    row.user,
                    row.cpu_percent,
                    row.mem_rss,
                    row.status,
                    row.elapsed,
                    row.collected_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Sorted by CPU% descending -- the sort-by-CPU behavior documented
    /// in spec.md §4.5 as living in the repository layer, not the sampler.
    pub fn list_processes(&self) -> Result<Vec<ProcessInfo>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT pid, name, user, cpu_percent, mem_rss, status, elapsed, collected_at
             FROM process_stats ORDER BY cpu_percent DESC",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(ProcessInfo {
                pid: r.get(0)?,
                name: r.get(1)?,
                user: r.get(2)?,
                cpu_percent: r.get(3)?,
                mem_rss: r.get(4)?,
                status: r.get(5)?,
                elapsed: r.get(6)?,
                collected_at: parse_timestamp(r.get::<_, String>(7)?),
            })
        })?;
        rows.collect::<Result<_, _>>().map_err(StorageError::from)
    }

    // -- log lines --------------------------------------------------

    pub fn save_log_entry(
        &self,
        log_name: &str,
        log_path: &str,
        line: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.conn().execute(
            "INSERT INTO log_lines (log_name, log_path, line, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![log_name, log_path, line, created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Deletes everything for `log_name` except the most recent
    /// `max_lines` rows (by `id`).
    pub fn trim_log_entries(&self, log_name: &str, max_lines: i64) -> Result<(), StorageError> {
        self.conn().execute(
            "DELETE FROM log_lines WHERE log_name = ?1 AND id NOT IN (
                 SELECT id FROM log_lines WHERE log_name = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![log_name, max_lines],
        )?;
        Ok(())
    }

    /// Entries in chronological order, optionally filtered to one log
    /// name, most recent `limit` rows.
    pub fn list_log_entries(
        &self,
        name: Option<&str>,
        limit: i64,
    ) -> Result<Vec<LogEntry>, StorageError> {
        let conn = self.conn();
        let map_row = |r: &rusqlite::Row| -> rusqlite::Result<LogEntry> {
            Ok(LogEntry {
                id: r.get(0)?,
                log_name: r.get(1)?,
                log_path: r.get(2)?,
                line: r.get(3)?,
                created_at: parse_timestamp(r.get::<_, String>(4)?),
            })
        };

        let mut rows = match name {
            Some(name) => {
                let mut stmt = conn.prepare(
                    "SELECT id, log_name, log_path, line, created_at FROM log_lines
                     WHERE log_name = ?1 ORDER BY id DESC LIMIT ?2",
                )?;
                stmt.query_map(params![name, limit], map_row)?
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, log_name, log_path, line, created_at FROM log_lines
                     ORDER BY id DESC LIMIT ?1",
                )?;
                stmt.query_map(params![limit], map_row)?.collect::<Result<Vec<_>, _>>()?
            }
        };
        // Queried newest-first for the LIMIT; reverse to chronological order.
        rows.reverse();
        Ok(rows)
    }

    // -- aggregated metrics -------------------------------------------

    pub fn save_aggregation_results(&self, results: &[AggregationResult]) -> Result<(), StorageError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for r in results {
            tx.execute(
                "INSERT INTO aggregated_metrics
                 (resource_type, metric_name, label_fingerprint, window_seconds, aggregation_type, value, window_end)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    r.resource,
                    r.metric,
                    r.label_fingerprint,
                    r.window.as_secs() as i64,
                    r.aggregation,
                    r.value,
                    r.window_end.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Looks up a single row, mapping "no such row" to `None` rather than an
/// error -- used where a missing row is a normal outcome.
#[allow(dead_code)]
pub(crate) fn optional<T>(result: rusqlite::Result<T>) -> rusqlite::Result<Option<T>> {
    result.optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = Store::open(path.to_str().unwrap()).unwrap();
        (dir, store)
    }

    #[test]
    fn fs_usage_is_replaced_by_mount_point() {
        let (_dir, store) = temp_store();
        let row = FilesystemUsage {
            mount_point: "/".to_string(),
            total_bytes: 100,
            used_bytes: 50,
            avail_bytes: 50,
            used_percent: 50.0,
            collected_at: Utc::now(),
        };
        store.save_fs_usage(&[row.clone()]).unwrap();
        let mut updated = row.clone();
        updated.used_bytes = 90;
        updated.used_percent = 90.0;
        store.save_fs_usage(&[updated]).unwrap();

        let rows = store.list_fs_usage().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].used_bytes, 90);
    }

    #[test]
    fn process_snapshot_replace_has_no_carryover() {
        let (_dir, store) = temp_store();
        let make = |pid: i64, cpu: f64| ProcessInfo {
            pid,
            name: "proc".to_string(),
            user: "root".to_string(),
            cpu_percent: cpu,
            mem_rss: 1024,
            status: "running".to_string(),
            elapsed: "00:01".to_string(),
            collected_at: Utc::now(),
        };
        store.replace_process_snapshot(&[make(1, 1.0), make(2, 2.0)]).unwrap();
        store.replace_process_snapshot(&[make(3, 3.0)]).unwrap();

        let rows = store.list_processes().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pid, 3);
    }

    #[test]
    fn processes_are_listed_sorted_by_cpu_descending() {
        let (_dir, store) = temp_store();
        let make = |pid: i64, cpu: f64| ProcessInfo {
            pid,
            name: "proc".to_string(),
            user: "root".to_string(),
            cpu_percent: cpu,
            mem_rss: 1024,
            status: "running".to_string(),
            elapsed: "00:01".to_string(),
            collected_at: Utc::now(),
        };
        store.replace_process_snapshot(&[make(1, 5.0), make(2, 50.0), make(3, 20.0)]).unwrap();
        let rows = store.list_processes().unwrap();
        assert_eq!(rows.iter().map(|p| p.pid).collect::<Vec<_>>(), vec![2, 3, 1]);
    }

    #[test]
    fn log_trim_keeps_only_the_most_recent_lines() {
        let (_dir, store) = temp_store();
        for i in 0..10 {
            store.save_log_entry("app", "/var/log/app.log", &format!("line {i}"), Utc::now()).unwrap();
        }
        store.trim_log_entries("app", 3).unwrap();
        let rows = store.list_log_entries(Some("app"), 100).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.last().unwrap().line, "line 9");
    }

    #[test]
    fn log_entries_are_returned_chronologically() {
        let (_dir, store) = temp_store();
        for i in 0..5 {
            store.save_log_entry("app", "/var/log/app.log", &format!("line {i}"), Utc::now()).unwrap();
        }
        let rows = store.list_log_entries(Some("app"), 100).unwrap();
        let lines: Vec<_> = rows.iter().map(|r| r.line.clone()).collect();
        assert_eq!(lines, vec!["line 0", "line 1", "line 2", "line 3", "line 4"]);
    }

    #[test]
    fn path_stats_pagination_reports_total_count() {
        let (_dir, store) = temp_store();
        for i in 0..5 {
            store.save_path_stats(&PathStats {
                path: format!("/p{i}"),
                file_count: 1,
                dir_count: 0,
                scan_duration_ms: 1,
                status: "OK".to_string(),
                error_message: None,
                collected_at: Utc::now(),
            }).unwrap();
        }
        let (rows, total) = store.list_path_stats(Some(2), 0).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(total, 5);
    }
}
