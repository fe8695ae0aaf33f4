// Copyright (c) 2026 voltwatch
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/voltwatch/voltwatch-rs

//! Meter gateway traits and common types

mod poller;
mod simulator;

pub use poller::Poller;
pub use simulator::SimulatedGateway;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One conductor of a three-phase supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    L1,
    L2,
    L3,
}

impl Phase {
    /// All phases in wire order
    pub const ALL: [Phase; 3] = [Phase::L1, Phase::L2, Phase::L3];

    /// Slot index for fixed-size per-phase state arrays
    pub fn index(self) -> usize {
        match self {
            Phase::L1 => 0,
            Phase::L2 => 1,
            Phase::L3 => 2,
        }
    }

    /// Lowercase wire label ("l1", "l2", "l3")
    pub fn label(self) -> &'static str {
        match self {
            Phase::L1 => "l1",
            Phase::L2 => "l2",
            Phase::L3 => "l3",
        }
    }

    /// Parse a phase label, case-insensitive
    pub fn parse(s: &str) -> Option<Phase> {
        match s.to_ascii_lowercase().as_str() {
            "l1" => Some(Phase::L1),
            "l2" => Some(Phase::L2),
            "l3" => Some(Phase::L3),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::L1 => write!(f, "L1"),
            Phase::L2 => write!(f, "L2"),
            Phase::L3 => write!(f, "L3"),
        }
    }
}

/// A single three-phase voltage reading.
///
/// Timestamps are monotonically non-decreasing within one ingest stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Reading {
    pub ts: DateTime<Utc>,
    pub v1: f64,
    pub v2: f64,
    pub v3: f64,
}

impl Reading {
    pub fn new(ts: DateTime<Utc>, v1: f64, v2: f64, v3: f64) -> Self {
        Self { ts, v1, v2, v3 }
    }

    /// Voltage on the given phase
    pub fn voltage(&self, phase: Phase) -> f64 {
        match phase {
            Phase::L1 => self.v1,
            Phase::L2 => self.v2,
            Phase::L3 => self.v3,
        }
    }
}

/// Trait for smart-meter gateways
#[async_trait]
pub trait MeterGateway: Send + Sync {
    /// Gateway unique identifier
    fn id(&self) -> &str;

    /// Connect to the gateway
    async fn connect(&mut self) -> Result<()>;

    /// Disconnect from the gateway
    async fn disconnect(&mut self) -> Result<()>;

    /// Read the current three-phase voltages
    async fn read(&mut self) -> Result<Reading>;
}
