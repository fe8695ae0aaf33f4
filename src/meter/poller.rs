// Copyright (c) 2026 voltwatch
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/voltwatch/voltwatch-rs

//! Gateway polling loop - the single writer of the state store

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use super::MeterGateway;
use crate::config::PollerConfig;
use crate::db::Database;
use crate::store::StateStore;

/// Drives the analytics pipeline: reads the gateway on a fixed interval,
/// pushes every reading into the store and forwards produced windows and
/// anomalies to the archive.
pub struct Poller {
    gateway: Box<dyn MeterGateway>,
    store: Arc<RwLock<StateStore>>,
    db: Option<Arc<Database>>,
    interval_seconds: u64,
}

impl Poller {
    pub fn new(
        gateway: Box<dyn MeterGateway>,
        store: Arc<RwLock<StateStore>>,
        db: Option<Arc<Database>>,
        config: &PollerConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            db,
            interval_seconds: config.interval_seconds,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        self.gateway.connect().await?;
        info!(
            "Polling gateway {} every {}s",
            self.gateway.id(),
            self.interval_seconds
        );

        let mut tick = interval(Duration::from_secs(self.interval_seconds.max(1)));

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.recv() => {
                    info!("Poller shutting down...");
                    break;
                }
            }
        }

        self.gateway.disconnect().await?;
        Ok(())
    }

    async fn poll_once(&mut self) {
        let reading = match self.gateway.read().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Gateway read failed: {}", e);
                return;
            }
        };

        let outcome = {
            let mut store = self.store.write().await;
            store.push(reading)
        };

        for anomaly in &outcome.anomalies {
            info!(
                "Anomaly on {}: {:?} ({:?}) started {}",
                anomaly.phase, anomaly.kind, anomaly.severity, anomaly.started_at
            );
            if let Some(db) = &self.db {
                if let Err(e) = db.store_anomaly(anomaly) {
                    warn!("Failed to archive anomaly: {}", e);
                }
            }
        }

        if let Some(window) = &outcome.completed_window {
            debug!(
                "Window {} closed: {} samples, rms {:.1}/{:.1}/{:.1}",
                window.window_start,
                window.sample_count,
                window.rms_v1,
                window.rms_v2,
                window.rms_v3
            );
            if let Some(db) = &self.db {
                if let Err(e) = db.store_window(window) {
                    warn!("Failed to archive window: {}", e);
                }
            }
        }
    }
}
