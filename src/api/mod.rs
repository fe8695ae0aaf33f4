// Copyright (c) 2026 voltwatch
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/voltwatch/voltwatch-rs

//! HTTP query surface - translates requests into calls on the state store

mod error;
mod handlers;

pub use error::{ApiError, ApiResult, ErrorResponse};

use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::analysis::VoltageAnalyzer;
use crate::config::{ApiConfig, Thresholds};
use crate::store::StateStore;
use handlers::Bounds;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Analytics store; single writer (the poller), many readers
    pub store: Arc<RwLock<StateStore>>,

    /// Pure per-reading classifier for the latest endpoint
    pub analyzer: VoltageAnalyzer,

    thresholds: Thresholds,
}

impl AppState {
    pub fn new(store: Arc<RwLock<StateStore>>, thresholds: Thresholds) -> Self {
        Self {
            store,
            analyzer: VoltageAnalyzer::new(thresholds.clone()),
            thresholds,
        }
    }

    fn bounds(&self) -> Bounds {
        Bounds {
            nominal: self.thresholds.nominal_voltage,
            min: self.thresholds.voltage_min,
            max: self.thresholds.voltage_max,
        }
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/voltage/latest", get(handlers::latest))
        .route("/api/voltage/history", get(handlers::history))
        .route("/api/voltage/anomalies", get(handlers::anomalies))
        .route("/api/voltage/anomalies/active", get(handlers::active_anomalies))
        .route("/api/voltage/compliance/weekly", get(handlers::weekly_compliance))
        .route("/api/voltage/summary", get(handlers::summary))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the API until the shutdown signal fires
pub async fn serve(
    config: &ApiConfig,
    state: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP API listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
