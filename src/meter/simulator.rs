// Copyright (c) 2026 voltwatch
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/voltwatch/voltwatch-rs

//! Simulated meter gateway for demo/testing

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::prelude::*;
use rand_distr::Normal;

use super::{MeterGateway, Phase, Reading};

/// Episodic supply condition on one phase
#[derive(Debug, Clone, Copy)]
enum SupplyState {
    Normal,
    /// Voltage depressed below the envelope
    Sag { level: f64, remaining: u32 },
    /// Voltage elevated above the envelope
    Swell { level: f64, remaining: u32 },
    /// Loss of supply
    Outage { remaining: u32 },
}

/// Generates realistic three-phase voltage.
///
/// Each phase idles around nominal with Gaussian noise and a slow shared
/// drift, and occasionally enters a sag, swell or outage episode that
/// persists across polls so the downstream state machines see genuine
/// multi-sample events.
pub struct SimulatedGateway {
    id: String,
    connected: bool,
    rng: StdRng,
    drift: f64,
    states: [SupplyState; 3],
    /// Per-poll, per-phase probability of starting an episode
    event_probability: f64,
}

impl SimulatedGateway {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            connected: false,
            rng: StdRng::from_entropy(),
            drift: 0.0,
            states: [SupplyState::Normal; 3],
            event_probability: 0.005,
        }
    }

    fn next_voltage(&mut self, phase: Phase) -> f64 {
        let i = phase.index();
        let noise = Normal::new(0.0, 1.2).unwrap();

        match self.states[i] {
            SupplyState::Normal => {
                if self.rng.gen::<f64>() < self.event_probability {
                    self.states[i] = self.start_episode();
                    return self.next_voltage(phase);
                }
                230.0 + self.drift + self.rng.sample::<f64, _>(noise)
            }
            SupplyState::Sag { level, remaining } => {
                self.states[i] = if remaining > 1 {
                    SupplyState::Sag { level, remaining: remaining - 1 }
                } else {
                    SupplyState::Normal
                };
                level + self.rng.sample::<f64, _>(Normal::new(0.0, 0.8).unwrap())
            }
            SupplyState::Swell { level, remaining } => {
                self.states[i] = if remaining > 1 {
                    SupplyState::Swell { level, remaining: remaining - 1 }
                } else {
                    SupplyState::Normal
                };
                level + self.rng.sample::<f64, _>(Normal::new(0.0, 0.8).unwrap())
            }
            SupplyState::Outage { remaining } => {
                self.states[i] = if remaining > 1 {
                    SupplyState::Outage { remaining: remaining - 1 }
                } else {
                    SupplyState::Normal
                };
                self.rng.gen_range(0.0..1.5)
            }
        }
    }

    fn start_episode(&mut self) -> SupplyState {
        let duration = self.rng.gen_range(3..30);
        match self.rng.gen_range(0..3) {
            0 => SupplyState::Sag {
                level: self.rng.gen_range(195.0..218.0),
                remaining: duration,
            },
            1 => SupplyState::Swell {
                level: self.rng.gen_range(242.0..255.0),
                remaining: duration,
            },
            _ => SupplyState::Outage {
                remaining: self.rng.gen_range(2..40),
            },
        }
    }
}

#[async_trait]
impl MeterGateway for SimulatedGateway {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    async fn read(&mut self) -> Result<Reading> {
        if !self.connected {
            bail!("gateway {} is not connected", self.id);
        }

        self.drift += self.rng.gen_range(-0.02..0.02);
        self.drift = self.drift.clamp(-3.0, 3.0);

        Ok(Reading {
            ts: Utc::now(),
            v1: self.next_voltage(Phase::L1),
            v2: self.next_voltage(Phase::L2),
            v3: self.next_voltage(Phase::L3),
        })
    }
}
