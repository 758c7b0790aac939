//! Durable bookkeeping tables this system owns outright (not the opaque
//! vector/keyword store spec.md's Non-goals describe): the embedding cache
//! (C2), project index metadata (C6), health metrics + query log (C17), and
//! alert history (C18). Backed by `libsql` in embedded/local-file mode —
//! never a server, never the networked `turso` mode the original teacher
//! crate also supported (dropped; see DESIGN.md).

use crate::types::{Alert, AlertSeverity, HealthMetrics, ProjectIndexMetadata};
use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use libsql::params;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

fn storage_err(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Storage(format!("{context}: {err}"))
}

/// A single-connection handle to the local relational store. libsql
/// connections are not `Sync` over concurrent writers, so callers serialize
/// through the inner mutex — adequate at this system's scale (single local
/// process, no remote replication per the Non-goals).
pub struct RelationalStore {
    conn: Arc<Mutex<libsql::Connection>>,
}

impl RelationalStore {
    /// Open (creating if absent) the local database file and ensure every
    /// table this module owns exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| storage_err("create data dir", e))?;
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| storage_err("open relational store", e))?;
        let conn = db
            .connect()
            .map_err(|e| storage_err("connect relational store", e))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// An in-memory store, used by tests that don't need persistence.
    pub async fn open_in_memory() -> Result<Self> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| storage_err("open in-memory relational store", e))?;
        let conn = db
            .connect()
            .map_err(|e| storage_err("connect in-memory relational store", e))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS embedding_cache (
                text_hash TEXT NOT NULL,
                model_name TEXT NOT NULL,
                embedding TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (text_hash, model_name)
            )",
            (),
        )
        .await
        .map_err(|e| storage_err("create embedding_cache", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS project_index_metadata (
                project_name TEXT PRIMARY KEY,
                first_indexed_at INTEGER NOT NULL,
                last_indexed_at INTEGER NOT NULL,
                total_files INTEGER NOT NULL,
                total_units INTEGER NOT NULL,
                is_watching INTEGER NOT NULL,
                index_version INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| storage_err("create project_index_metadata", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS health_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                avg_search_latency_ms REAL NOT NULL,
                p95_search_latency_ms REAL NOT NULL,
                cache_hit_rate REAL NOT NULL,
                index_staleness_ratio REAL NOT NULL,
                avg_result_relevance REAL NOT NULL,
                noise_ratio REAL NOT NULL,
                duplicate_rate REAL NOT NULL,
                contradiction_rate REAL NOT NULL,
                total_memories INTEGER NOT NULL,
                active_memories INTEGER NOT NULL,
                recent_memories INTEGER NOT NULL,
                archived_memories INTEGER NOT NULL,
                stale_memories INTEGER NOT NULL,
                active_projects INTEGER NOT NULL,
                archived_projects INTEGER NOT NULL,
                database_size_mb REAL NOT NULL,
                queries_per_day REAL NOT NULL,
                memories_created_per_day REAL NOT NULL,
                avg_results_per_query REAL NOT NULL,
                health_score REAL NOT NULL,
                created_at INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| storage_err("create health_metrics", e))?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_health_metrics_timestamp ON health_metrics(timestamp)",
            (),
        )
        .await
        .map_err(|e| storage_err("index health_metrics", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS query_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query TEXT NOT NULL,
                latency_ms REAL NOT NULL,
                result_count INTEGER NOT NULL,
                avg_relevance REAL,
                timestamp INTEGER NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| storage_err("create query_log", e))?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_query_log_timestamp ON query_log(timestamp)",
            (),
        )
        .await
        .map_err(|e| storage_err("index query_log", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS alert_history (
                id TEXT PRIMARY KEY,
                severity TEXT NOT NULL,
                metric_name TEXT NOT NULL,
                current_value REAL NOT NULL,
                threshold_value REAL NOT NULL,
                message TEXT NOT NULL,
                recommendations TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                resolved INTEGER NOT NULL,
                resolved_at INTEGER,
                snoozed_until INTEGER
            )",
            (),
        )
        .await
        .map_err(|e| storage_err("create alert_history", e))?;

        Ok(())
    }

    // ---------------------------------------------------------------- C2

    pub async fn get_cached_embedding(
        &self,
        text_hash: &str,
        model_name: &str,
    ) -> Result<Option<Vec<f32>>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT embedding FROM embedding_cache WHERE text_hash = ? AND model_name = ?",
                params![text_hash.to_string(), model_name.to_string()],
            )
            .await
            .map_err(|e| storage_err("query embedding_cache", e))?;
        match rows
            .next()
            .await
            .map_err(|e| storage_err("read embedding_cache row", e))?
        {
            Some(row) => {
                let json: String = row.get(0).map_err(|e| storage_err("decode embedding", e))?;
                let vector: Vec<f32> = serde_json::from_str(&json)?;
                Ok(Some(vector))
            }
            None => Ok(None),
        }
    }

    pub async fn put_cached_embedding(
        &self,
        text_hash: &str,
        model_name: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let json = serde_json::to_string(embedding)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO embedding_cache (text_hash, model_name, embedding, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(text_hash, model_name) DO UPDATE SET embedding = excluded.embedding",
            params![
                text_hash.to_string(),
                model_name.to_string(),
                json,
                Utc::now().timestamp()
            ],
        )
        .await
        .map_err(|e| storage_err("insert embedding_cache", e))?;
        Ok(())
    }

    // ---------------------------------------------------------------- C6

    pub async fn get_project_index_metadata(
        &self,
        project_name: &str,
    ) -> Result<Option<ProjectIndexMetadata>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT project_name, first_indexed_at, last_indexed_at, total_files,
                        total_units, is_watching, index_version
                 FROM project_index_metadata WHERE project_name = ?",
                params![project_name.to_string()],
            )
            .await
            .map_err(|e| storage_err("query project_index_metadata", e))?;
        match rows
            .next()
            .await
            .map_err(|e| storage_err("read project_index_metadata row", e))?
        {
            Some(row) => Ok(Some(row_to_project_metadata(&row)?)),
            None => Ok(None),
        }
    }

    /// Create-or-update with the current timestamp as `last_indexed_at`;
    /// `first_indexed_at` is preserved across updates.
    pub async fn upsert_project_index_metadata(
        &self,
        project_name: &str,
        total_files: u64,
        total_units: u64,
        is_watching: bool,
    ) -> Result<ProjectIndexMetadata> {
        let now = Utc::now();
        let existing = self.get_project_index_metadata(project_name).await?;
        let first_indexed_at = existing.as_ref().map_or(now, |m| m.first_indexed_at);
        let index_version = existing.as_ref().map_or(1, |m| m.index_version);
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO project_index_metadata
                (project_name, first_indexed_at, last_indexed_at, total_files, total_units,
                 is_watching, index_version)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(project_name) DO UPDATE SET
                last_indexed_at = excluded.last_indexed_at,
                total_files = excluded.total_files,
                total_units = excluded.total_units,
                is_watching = excluded.is_watching",
            params![
                project_name.to_string(),
                first_indexed_at.timestamp(),
                now.timestamp(),
                total_files as i64,
                total_units as i64,
                i64::from(is_watching),
                i64::from(index_version)
            ],
        )
        .await
        .map_err(|e| storage_err("upsert project_index_metadata", e))?;
        Ok(ProjectIndexMetadata {
            project_name: project_name.to_string(),
            first_indexed_at,
            last_indexed_at: now,
            total_files,
            total_units,
            is_watching,
            index_version,
        })
    }

    pub async fn set_watching(&self, project_name: &str, watching: bool) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE project_index_metadata SET is_watching = ? WHERE project_name = ?",
            params![i64::from(watching), project_name.to_string()],
        )
        .await
        .map_err(|e| storage_err("update is_watching", e))?;
        Ok(())
    }

    pub async fn delete_project_index_metadata(&self, project_name: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM project_index_metadata WHERE project_name = ?",
            params![project_name.to_string()],
        )
        .await
        .map_err(|e| storage_err("delete project_index_metadata", e))?;
        Ok(())
    }

    // --------------------------------------------------------------- C17

    pub async fn insert_health_metrics(&self, metrics: &HealthMetrics) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO health_metrics (
                timestamp, avg_search_latency_ms, p95_search_latency_ms, cache_hit_rate,
                index_staleness_ratio, avg_result_relevance, noise_ratio, duplicate_rate,
                contradiction_rate, total_memories, active_memories, recent_memories,
                archived_memories, stale_memories, active_projects, archived_projects,
                database_size_mb, queries_per_day, memories_created_per_day,
                avg_results_per_query, health_score, created_at
             ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
            params![
                metrics.timestamp.timestamp(),
                metrics.avg_search_latency_ms,
                metrics.p95_search_latency_ms,
                metrics.cache_hit_rate,
                metrics.index_staleness_ratio,
                metrics.avg_result_relevance,
                metrics.noise_ratio,
                metrics.duplicate_rate,
                metrics.contradiction_rate,
                metrics.total_memories,
                metrics.active_memories,
                metrics.recent_memories,
                metrics.archived_memories,
                metrics.stale_memories,
                metrics.active_projects,
                metrics.archived_projects,
                metrics.database_size_mb,
                metrics.queries_per_day,
                metrics.memories_created_per_day,
                metrics.avg_results_per_query,
                metrics.health_score,
                Utc::now().timestamp()
            ],
        )
        .await
        .map_err(|e| storage_err("insert health_metrics", e))?;
        Ok(())
    }

    pub async fn get_latest_health_metrics(&self) -> Result<Option<HealthMetrics>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT timestamp, avg_search_latency_ms, p95_search_latency_ms, cache_hit_rate,
                        index_staleness_ratio, avg_result_relevance, noise_ratio, duplicate_rate,
                        contradiction_rate, total_memories, active_memories, recent_memories,
                        archived_memories, stale_memories, active_projects, archived_projects,
                        database_size_mb, queries_per_day, memories_created_per_day,
                        avg_results_per_query, health_score
                 FROM health_metrics ORDER BY timestamp DESC LIMIT 1",
                (),
            )
            .await
            .map_err(|e| storage_err("query latest health_metrics", e))?;
        match rows
            .next()
            .await
            .map_err(|e| storage_err("read health_metrics row", e))?
        {
            Some(row) => Ok(Some(row_to_health_metrics(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_health_metrics_history(&self, days: i64) -> Result<Vec<HealthMetrics>> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).timestamp();
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT timestamp, avg_search_latency_ms, p95_search_latency_ms, cache_hit_rate,
                        index_staleness_ratio, avg_result_relevance, noise_ratio, duplicate_rate,
                        contradiction_rate, total_memories, active_memories, recent_memories,
                        archived_memories, stale_memories, active_projects, archived_projects,
                        database_size_mb, queries_per_day, memories_created_per_day,
                        avg_results_per_query, health_score
                 FROM health_metrics WHERE timestamp >= ? ORDER BY timestamp ASC",
                params![cutoff],
            )
            .await
            .map_err(|e| storage_err("query health_metrics history", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_err("read health_metrics row", e))?
        {
            out.push(row_to_health_metrics(&row)?);
        }
        Ok(out)
    }

    pub async fn cleanup_old_health_metrics(&self, retention_days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).timestamp();
        let conn = self.conn.lock().await;
        let affected = conn
            .execute(
                "DELETE FROM health_metrics WHERE timestamp < ?",
                params![cutoff],
            )
            .await
            .map_err(|e| storage_err("cleanup health_metrics", e))?;
        Ok(affected as usize)
    }

    pub async fn log_query(
        &self,
        query: &str,
        latency_ms: f64,
        result_count: usize,
        avg_relevance: Option<f64>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO query_log (query, latency_ms, result_count, avg_relevance, timestamp)
             VALUES (?, ?, ?, ?, ?)",
            params![
                query.to_string(),
                latency_ms,
                result_count as i64,
                avg_relevance,
                Utc::now().timestamp()
            ],
        )
        .await
        .map_err(|e| storage_err("insert query_log", e))?;
        Ok(())
    }

    /// `(avg_latency_ms, p95_latency_ms, avg_relevance, queries_per_day,
    /// avg_results_per_query)` over the last `window_days` days.
    pub async fn query_log_window_stats(
        &self,
        window_days: i64,
    ) -> Result<(f64, f64, f64, f64, f64)> {
        let cutoff = (Utc::now() - chrono::Duration::days(window_days)).timestamp();
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT latency_ms, result_count, avg_relevance FROM query_log
                 WHERE timestamp >= ? ORDER BY latency_ms ASC",
                params![cutoff],
            )
            .await
            .map_err(|e| storage_err("query query_log window", e))?;
        let mut latencies = Vec::new();
        let mut result_counts = Vec::new();
        let mut relevances = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_err("read query_log row", e))?
        {
            let latency: f64 = row.get(0).map_err(|e| storage_err("decode latency", e))?;
            let count: i64 = row.get(1).map_err(|e| storage_err("decode count", e))?;
            let relevance: Option<f64> = row.get(2).ok();
            latencies.push(latency);
            result_counts.push(count as f64);
            if let Some(r) = relevance {
                relevances.push(r);
            }
        }
        if latencies.is_empty() {
            return Ok((0.0, 0.0, 0.0, 0.0, 0.0));
        }
        let avg_latency = latencies.iter().sum::<f64>() / latencies.len() as f64;
        let p95_index = ((latencies.len() as f64) * 0.95).ceil() as usize;
        let p95_latency = latencies[p95_index.saturating_sub(1).min(latencies.len() - 1)];
        let avg_relevance = if relevances.is_empty() {
            0.0
        } else {
            relevances.iter().sum::<f64>() / relevances.len() as f64
        };
        let queries_per_day = latencies.len() as f64 / window_days.max(1) as f64;
        let avg_results = result_counts.iter().sum::<f64>() / result_counts.len() as f64;
        Ok((
            avg_latency,
            p95_latency,
            avg_relevance,
            queries_per_day,
            avg_results,
        ))
    }

    pub async fn get_daily_aggregate(
        &self,
        days: i64,
    ) -> Result<Vec<(DateTime<Utc>, f64, f64)>> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).timestamp();
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT (timestamp / 86400) * 86400 AS day_bucket,
                        AVG(latency_ms), AVG(result_count)
                 FROM query_log WHERE timestamp >= ?
                 GROUP BY day_bucket ORDER BY day_bucket ASC",
                params![cutoff],
            )
            .await
            .map_err(|e| storage_err("query daily aggregate", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_err("read daily aggregate row", e))?
        {
            let bucket: i64 = row.get(0).map_err(|e| storage_err("decode bucket", e))?;
            let avg_latency: f64 = row.get(1).map_err(|e| storage_err("decode avg latency", e))?;
            let avg_results: f64 = row.get(2).map_err(|e| storage_err("decode avg results", e))?;
            let timestamp = Utc
                .timestamp_opt(bucket, 0)
                .single()
                .unwrap_or_else(Utc::now);
            out.push((timestamp, avg_latency, avg_results));
        }
        Ok(out)
    }

    // --------------------------------------------------------------- C18

    /// Store-or-update: if `alert.id` already exists, update `current_value`
    /// and `timestamp` only; otherwise insert. Keeps `store_alerts` applied
    /// twice from creating a duplicate row (spec.md §8).
    pub async fn store_alert(&self, alert: &Alert) -> Result<()> {
        let recommendations = serde_json::to_string(&alert.recommendations)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO alert_history (
                id, severity, metric_name, current_value, threshold_value, message,
                recommendations, timestamp, resolved, resolved_at, snoozed_until
             ) VALUES (?,?,?,?,?,?,?,?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET
                current_value = excluded.current_value,
                timestamp = excluded.timestamp",
            params![
                alert.id.clone(),
                severity_str(alert.severity).to_string(),
                alert.metric_name.clone(),
                alert.current_value,
                alert.threshold_value,
                alert.message.clone(),
                recommendations,
                alert.timestamp.timestamp(),
                i64::from(alert.resolved),
                alert.resolved_at.map(|t| t.timestamp()),
                alert.snoozed_until.map(|t| t.timestamp()),
            ],
        )
        .await
        .map_err(|e| storage_err("upsert alert_history", e))?;
        Ok(())
    }

    pub async fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT id, severity, metric_name, current_value, threshold_value, message,
                        recommendations, timestamp, resolved, resolved_at, snoozed_until
                 FROM alert_history WHERE id = ?",
                params![id.to_string()],
            )
            .await
            .map_err(|e| storage_err("query alert", e))?;
        match rows
            .next()
            .await
            .map_err(|e| storage_err("read alert row", e))?
        {
            Some(row) => Ok(Some(row_to_alert(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_alerts(&self) -> Result<Vec<Alert>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT id, severity, metric_name, current_value, threshold_value, message,
                        recommendations, timestamp, resolved, resolved_at, snoozed_until
                 FROM alert_history ORDER BY timestamp DESC",
                (),
            )
            .await
            .map_err(|e| storage_err("list alerts", e))?;
        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| storage_err("read alert row", e))?
        {
            out.push(row_to_alert(&row)?);
        }
        Ok(out)
    }

    pub async fn resolve_alert(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let affected = conn
            .execute(
                "UPDATE alert_history SET resolved = 1, resolved_at = ? WHERE id = ?",
                params![Utc::now().timestamp(), id.to_string()],
            )
            .await
            .map_err(|e| storage_err("resolve alert", e))?;
        Ok(affected > 0)
    }

    pub async fn snooze_alert(&self, id: &str, until: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock().await;
        let affected = conn
            .execute(
                "UPDATE alert_history SET snoozed_until = ? WHERE id = ?",
                params![until.timestamp(), id.to_string()],
            )
            .await
            .map_err(|e| storage_err("snooze alert", e))?;
        Ok(affected > 0)
    }

    /// Deletes only resolved alerts older than the retention window, per
    /// spec.md §4.C18.
    pub async fn cleanup_old_alerts(&self, retention_days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).timestamp();
        let conn = self.conn.lock().await;
        let affected = conn
            .execute(
                "DELETE FROM alert_history WHERE resolved = 1 AND resolved_at < ?",
                params![cutoff],
            )
            .await
            .map_err(|e| storage_err("cleanup alerts", e))?;
        Ok(affected as usize)
    }
}

fn severity_str(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Critical => "CRITICAL",
        AlertSeverity::Warning => "WARNING",
        AlertSeverity::Info => "INFO",
    }
}

fn severity_from_str(s: &str) -> AlertSeverity {
    match s {
        "CRITICAL" => AlertSeverity::Critical,
        "INFO" => AlertSeverity::Info,
        _ => AlertSeverity::Warning,
    }
}

fn row_to_project_metadata(row: &libsql::Row) -> Result<ProjectIndexMetadata> {
    let first: i64 = row.get(1).map_err(|e| storage_err("decode first_indexed_at", e))?;
    let last: i64 = row.get(2).map_err(|e| storage_err("decode last_indexed_at", e))?;
    Ok(ProjectIndexMetadata {
        project_name: row.get(0).map_err(|e| storage_err("decode project_name", e))?,
        first_indexed_at: Utc.timestamp_opt(first, 0).single().unwrap_or_else(Utc::now),
        last_indexed_at: Utc.timestamp_opt(last, 0).single().unwrap_or_else(Utc::now),
        total_files: row.get::<i64>(3).map_err(|e| storage_err("decode total_files", e))? as u64,
        total_units: row.get::<i64>(4).map_err(|e| storage_err("decode total_units", e))? as u64,
        is_watching: row.get::<i64>(5).map_err(|e| storage_err("decode is_watching", e))? != 0,
        index_version: row.get::<i64>(6).map_err(|e| storage_err("decode index_version", e))? as u32,
    })
}

fn row_to_health_metrics(row: &libsql::Row) -> Result<HealthMetrics> {
    let ts: i64 = row.get(0).map_err(|e| storage_err("decode timestamp", e))?;
    Ok(HealthMetrics {
        timestamp: Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now),
        avg_search_latency_ms: row.get(1).map_err(|e| storage_err("decode field", e))?,
        p95_search_latency_ms: row.get(2).map_err(|e| storage_err("decode field", e))?,
        cache_hit_rate: row.get(3).map_err(|e| storage_err("decode field", e))?,
        index_staleness_ratio: row.get(4).map_err(|e| storage_err("decode field", e))?,
        avg_result_relevance: row.get(5).map_err(|e| storage_err("decode field", e))?,
        noise_ratio: row.get(6).map_err(|e| storage_err("decode field", e))?,
        duplicate_rate: row.get(7).map_err(|e| storage_err("decode field", e))?,
        contradiction_rate: row.get(8).map_err(|e| storage_err("decode field", e))?,
        total_memories: row.get(9).map_err(|e| storage_err("decode field", e))?,
        active_memories: row.get(10).map_err(|e| storage_err("decode field", e))?,
        recent_memories: row.get(11).map_err(|e| storage_err("decode field", e))?,
        archived_memories: row.get(12).map_err(|e| storage_err("decode field", e))?,
        stale_memories: row.get(13).map_err(|e| storage_err("decode field", e))?,
        active_projects: row.get(14).map_err(|e| storage_err("decode field", e))?,
        archived_projects: row.get(15).map_err(|e| storage_err("decode field", e))?,
        database_size_mb: row.get(16).map_err(|e| storage_err("decode field", e))?,
        queries_per_day: row.get(17).map_err(|e| storage_err("decode field", e))?,
        memories_created_per_day: row.get(18).map_err(|e| storage_err("decode field", e))?,
        avg_results_per_query: row.get(19).map_err(|e| storage_err("decode field", e))?,
        health_score: row.get(20).map_err(|e| storage_err("decode field", e))?,
    })
}

fn row_to_alert(row: &libsql::Row) -> Result<Alert> {
    let severity: String = row.get(1).map_err(|e| storage_err("decode severity", e))?;
    let recommendations_json: String = row
        .get(6)
        .map_err(|e| storage_err("decode recommendations", e))?;
    let timestamp: i64 = row.get(7).map_err(|e| storage_err("decode timestamp", e))?;
    let resolved_at: Option<i64> = row.get(9).ok();
    let snoozed_until: Option<i64> = row.get(10).ok();
    Ok(Alert {
        id: row.get(0).map_err(|e| storage_err("decode id", e))?,
        severity: severity_from_str(&severity),
        metric_name: row.get(2).map_err(|e| storage_err("decode metric_name", e))?,
        current_value: row.get(3).map_err(|e| storage_err("decode current_value", e))?,
        threshold_value: row
            .get(4)
            .map_err(|e| storage_err("decode threshold_value", e))?,
        message: row.get(5).map_err(|e| storage_err("decode message", e))?,
        recommendations: serde_json::from_str(&recommendations_json)?,
        timestamp: Utc.timestamp_opt(timestamp, 0).single().unwrap_or_else(Utc::now),
        resolved: row.get::<i64>(8).map_err(|e| storage_err("decode resolved", e))? != 0,
        resolved_at: resolved_at.and_then(|t| Utc.timestamp_opt(t, 0).single()),
        snoozed_until: snoozed_until.and_then(|t| Utc.timestamp_opt(t, 0).single()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_cache_round_trips() {
        let store = RelationalStore::open_in_memory().await.unwrap();
        assert!(store
            .get_cached_embedding("hash1", "model-a")
            .await
            .unwrap()
            .is_none());
        store
            .put_cached_embedding("hash1", "model-a", &[1.0, 2.0, 3.0])
            .await
            .unwrap();
        let cached = store
            .get_cached_embedding("hash1", "model-a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn project_index_metadata_preserves_first_indexed_at() {
        let store = RelationalStore::open_in_memory().await.unwrap();
        let first = store
            .upsert_project_index_metadata("demo", 10, 50, true)
            .await
            .unwrap();
        let second = store
            .upsert_project_index_metadata("demo", 20, 90, true)
            .await
            .unwrap();
        assert_eq!(first.first_indexed_at, second.first_indexed_at);
        assert_eq!(second.total_files, 20);
    }

    #[tokio::test]
    async fn store_alert_twice_updates_not_duplicates() {
        let store = RelationalStore::open_in_memory().await.unwrap();
        let mut alert = Alert {
            id: "alert_avg_result_relevance_20260101".into(),
            severity: AlertSeverity::Critical,
            metric_name: "avg_result_relevance".into(),
            current_value: 0.2,
            threshold_value: 0.3,
            message: "relevance too low".into(),
            recommendations: vec![],
            timestamp: Utc::now(),
            resolved: false,
            resolved_at: None,
            snoozed_until: None,
        };
        store.store_alert(&alert).await.unwrap();
        alert.current_value = 0.1;
        store.store_alert(&alert).await.unwrap();
        let all = store.list_alerts().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].current_value, 0.1);
    }

    #[tokio::test]
    async fn cleanup_old_alerts_only_removes_resolved() {
        let store = RelationalStore::open_in_memory().await.unwrap();
        let old = Utc::now() - chrono::Duration::days(200);
        let resolved = Alert {
            id: "alert_x_1".into(),
            severity: AlertSeverity::Info,
            metric_name: "x".into(),
            current_value: 1.0,
            threshold_value: 1.0,
            message: "m".into(),
            recommendations: vec![],
            timestamp: old,
            resolved: true,
            resolved_at: Some(old),
            snoozed_until: None,
        };
        let unresolved = Alert {
            id: "alert_x_2".into(),
            resolved: false,
            resolved_at: None,
            ..resolved.clone()
        };
        store.store_alert(&resolved).await.unwrap();
        store.store_alert(&unresolved).await.unwrap();
        let removed = store.cleanup_old_alerts(90).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.list_alerts().await.unwrap().len(), 1);
    }
}
