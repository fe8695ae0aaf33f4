// Copyright (c) 2026 voltwatch
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/voltwatch/voltwatch-rs

//! VoltWatch - Three-Phase Voltage Quality Monitor
//!
//! A streaming voltage analytics service for smart-meter gateways:
//! - Per-reading phase analysis against the ESO voltage envelope
//! - Interruption and deviation event detection with severity grading
//! - Fixed 10-minute RMS windows and weekly 95 % compliance verdicts
//! - Bounded in-memory store behind a JSON HTTP API
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      VoltWatch Pipeline                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐   ┌──────────────────────────────┐  ┌────────┐  │
//! │  │ Gateway │ → │          State Store         │← │  HTTP  │  │
//! │  │ Poller  │   │  ┌─────────┐  ┌───────────┐  │  │  API   │  │
//! │  └─────────┘   │  │ Anomaly │  │    RMS    │  │  └────────┘  │
//! │       ↓        │  │ Tracker │  │ Aggregator│  │              │
//! │  ┌─────────┐   │  └─────────┘  └───────────┘  │              │
//! │  │ SQLite  │ ← │   readings / windows /       │              │
//! │  │ Archive │   │   anomalies ring buffers     │              │
//! │  └─────────┘   └──────────────────────────────┘              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod analysis;
pub mod api;
pub mod config;
pub mod db;
pub mod meter;
pub mod store;

// Re-exports for convenience
pub use analysis::{
    Anomaly, AnomalyKind, AnomalyTracker, PhaseAnalysis, RmsAggregator, RmsWindow, Severity,
    VoltageAnalyzer, WeeklyCompliance,
};
pub use config::{Config, Thresholds};
pub use meter::{MeterGateway, Phase, Poller, Reading, SimulatedGateway};
pub use store::{StateStore, StoreStats};

/// VoltWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// VoltWatch name
pub const NAME: &str = "VoltWatch";
