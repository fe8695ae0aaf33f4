// Copyright (c) 2026 voltwatch
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/voltwatch/voltwatch-rs

//! Configuration module

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Voltage quality thresholds
    pub thresholds: Thresholds,

    /// Poller configuration
    pub poller: PollerConfig,

    /// In-memory store configuration
    pub store: StoreConfig,

    /// HTTP API configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "voltwatch".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            thresholds: Thresholds::default(),
            poller: PollerConfig::default(),
            store: StoreConfig::default(),
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Read and parse a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Write the configuration as pretty TOML, creating parent directories
    /// as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        std::fs::write(path, rendered)
            .with_context(|| format!("writing config file {}", path.display()))
    }

    /// Load the file at `path`, seeding it with defaults on first run
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!("No config found, wrote defaults to {}", path.display());
            return Ok(config);
        }

        let config = Self::load(path)?;
        debug!("Configuration read from {}", path.display());
        Ok(config)
    }

    /// Default configuration path under the platform config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("./config"))
            .join("voltwatch")
            .join("config.toml")
    }
}

/// Voltage quality thresholds (ESO grid rules).
///
/// Frozen at startup; every analytics component reads these, none mutates
/// them. Defaults encode the ESO envelope for a 230 V phase-to-neutral
/// supply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Nominal phase-to-neutral voltage in volts
    pub nominal_voltage: f64,

    /// Lower envelope bound in volts (inclusive)
    pub voltage_min: f64,

    /// Upper envelope bound in volts (inclusive)
    pub voltage_max: f64,

    /// Below this the phase is treated as loss of supply
    pub voltage_zero_threshold: f64,

    /// Fixed RMS window length in minutes
    pub window_minutes: u32,

    /// Maximum out-of-bounds seconds for a window to count as compliant
    pub window_oob_max_seconds: u32,

    /// Interruptions strictly longer than this are classified LONG
    pub long_interruption_seconds: u32,

    /// Minimum per-phase compliant-window percentage for the weekly verdict
    pub weekly_compliance_pct: f64,

    /// Assumed sample spacing for out-of-bounds duration accounting
    pub poll_interval_seconds: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            nominal_voltage: 230.0,
            voltage_min: 220.0,
            voltage_max: 240.0,
            voltage_zero_threshold: 10.0,
            window_minutes: 10,
            window_oob_max_seconds: 30,
            long_interruption_seconds: 180,
            weekly_compliance_pct: 95.0,
            poll_interval_seconds: 10,
        }
    }
}

impl Thresholds {
    /// Window length in seconds
    pub fn window_seconds(&self) -> u32 {
        self.window_minutes * 60
    }
}

/// Poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between gateway reads
    pub interval_seconds: u64,

    /// Gateway identifier reported in logs
    pub gateway_id: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            gateway_id: "meter-gw-1".to_string(),
        }
    }
}

/// In-memory store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Reading ring buffer capacity (~24 h at 1 s cadence)
    pub reading_capacity: usize,

    /// RMS window ring buffer capacity (two weeks of 10-minute windows)
    pub window_capacity: usize,

    /// Anomaly ring buffer capacity
    pub anomaly_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            reading_capacity: 86_400,
            window_capacity: 2_016,
            anomaly_capacity: 1_000,
        }
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bind address
    pub bind_addr: String,

    /// Listen port
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Enable the SQLite archive
    pub enabled: bool,

    /// Database path
    pub path: PathBuf,

    /// Retention period in days
    pub retention_days: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./data/voltwatch.db"),
            retention_days: 90,
        }
    }
}
