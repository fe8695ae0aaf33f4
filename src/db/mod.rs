// Copyright (c) 2026 voltwatch
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/voltwatch/voltwatch-rs

//! SQLite archive for completed windows and emitted anomalies.
//!
//! Write-path only: read queries are always served from the in-memory store.
//! The archive exists so compliance evidence survives restarts.

use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::analysis::{Anomaly, RmsWindow};
use crate::config::DatabaseConfig;

/// Archive database
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    config: DatabaseConfig,
}

impl Database {
    /// Open or create the archive
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.path)?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            config: config.clone(),
        };

        db.create_tables()?;

        info!("Archive database opened at {:?}", config.path);
        Ok(db)
    }

    /// In-memory archive for tests
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            config: DatabaseConfig::default(),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            -- Completed 10-minute RMS windows
            CREATE TABLE IF NOT EXISTS rms_windows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                window_start TEXT NOT NULL,
                window_end TEXT NOT NULL,
                sample_count INTEGER NOT NULL,
                rms_v1 REAL NOT NULL,
                rms_v2 REAL NOT NULL,
                rms_v3 REAL NOT NULL,
                oob_seconds_l1 INTEGER NOT NULL,
                oob_seconds_l2 INTEGER NOT NULL,
                oob_seconds_l3 INTEGER NOT NULL,
                compliant_l1 INTEGER NOT NULL,
                compliant_l2 INTEGER NOT NULL,
                compliant_l3 INTEGER NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_windows_start ON rms_windows(window_start);

            -- Emitted anomaly events
            CREATE TABLE IF NOT EXISTS anomalies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                phase TEXT NOT NULL,
                kind TEXT NOT NULL,
                severity TEXT NOT NULL,
                v_min REAL,
                v_max REAL,
                duration_s REAL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_anomalies_started ON anomalies(started_at);
        "#,
        )?;

        Ok(())
    }

    /// Archive a completed window
    pub fn store_window(&self, window: &RmsWindow) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"INSERT INTO rms_windows
               (window_start, window_end, sample_count, rms_v1, rms_v2, rms_v3,
                oob_seconds_l1, oob_seconds_l2, oob_seconds_l3,
                compliant_l1, compliant_l2, compliant_l3)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
            params![
                window.window_start.to_rfc3339(),
                window.window_end.to_rfc3339(),
                window.sample_count,
                window.rms_v1,
                window.rms_v2,
                window.rms_v3,
                window.oob_seconds_l1,
                window.oob_seconds_l2,
                window.oob_seconds_l3,
                window.compliant_l1,
                window.compliant_l2,
                window.compliant_l3,
            ],
        )?;

        Ok(())
    }

    /// Archive an emitted anomaly
    pub fn store_anomaly(&self, anomaly: &Anomaly) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"INSERT INTO anomalies
               (started_at, ended_at, phase, kind, severity, v_min, v_max, duration_s)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                anomaly.started_at.to_rfc3339(),
                anomaly.ended_at.map(|ts| ts.to_rfc3339()),
                anomaly.phase.to_string(),
                format!("{:?}", anomaly.kind),
                format!("{:?}", anomaly.severity),
                anomaly.v_min,
                anomaly.v_max,
                anomaly.duration_s,
            ],
        )?;

        Ok(())
    }

    /// Archive row counts
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let conn = self.conn.lock().unwrap();

        let window_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM rms_windows", [], |row| row.get(0))?;
        let anomaly_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM anomalies", [], |row| row.get(0))?;

        Ok(DatabaseStats {
            window_count: window_count as usize,
            anomaly_count: anomaly_count as usize,
        })
    }

    /// Delete rows older than the configured retention period
    pub fn cleanup(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();

        let cutoff = Utc::now() - chrono::Duration::days(self.config.retention_days as i64);
        let cutoff = cutoff.to_rfc3339();

        let deleted_windows = conn.execute(
            "DELETE FROM rms_windows WHERE window_start < ?1",
            params![cutoff],
        )?;
        let deleted_anomalies = conn.execute(
            "DELETE FROM anomalies WHERE started_at < ?1",
            params![cutoff],
        )?;

        if deleted_windows + deleted_anomalies > 0 {
            info!(
                "Cleaned up {} windows and {} anomalies older than {} days",
                deleted_windows, deleted_anomalies, self.config.retention_days
            );
        }

        Ok(deleted_windows + deleted_anomalies)
    }
}

/// Archive statistics
#[derive(Debug, Clone, Copy)]
pub struct DatabaseStats {
    pub window_count: usize,
    pub anomaly_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RmsAggregator;
    use crate::config::Thresholds;
    use crate::meter::Reading;
    use chrono::{Duration, TimeZone};

    #[test]
    fn windows_and_anomalies_are_archived() {
        let db = Database::open_in_memory().unwrap();

        let slot = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let agg = RmsAggregator::new(Thresholds::default());
        let readings: Vec<Reading> = (0..6)
            .map(|i| Reading::new(slot + Duration::seconds(i * 10), 230.0, 230.0, 230.0))
            .collect();
        let window = agg.aggregate(slot, &readings);
        db.store_window(&window).unwrap();

        let mut tracker = crate::analysis::AnomalyTracker::new(Thresholds::default());
        tracker.process(&Reading::new(slot, 0.0, 230.0, 230.0));
        let emitted =
            tracker.process(&Reading::new(slot + Duration::seconds(10), 230.0, 230.0, 230.0));
        db.store_anomaly(&emitted[0]).unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.window_count, 1);
        assert_eq!(stats.anomaly_count, 1);
    }

    #[test]
    fn cleanup_respects_retention() {
        let db = Database::open_in_memory().unwrap();

        // Older than any sane retention period
        let old_slot = Utc.with_ymd_and_hms(2000, 1, 3, 0, 0, 0).unwrap();
        let agg = RmsAggregator::new(Thresholds::default());
        let window = agg.aggregate(old_slot, &[Reading::new(old_slot, 230.0, 230.0, 230.0)]);
        db.store_window(&window).unwrap();

        let deleted = db.cleanup().unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.get_stats().unwrap().window_count, 0);
    }
}
