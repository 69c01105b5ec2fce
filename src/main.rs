// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AQI Tracker API Server
//!
//! Runs the fetch scheduler in the background and serves the stored
//! readings over HTTP until Ctrl-C.

use anyhow::Context;
use aqi_tracker::{
    config::Config,
    db::ReadingStore,
    services::{CycleMonitor, FetchScheduler, QueryService, WaqiClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        port = config.port,
        cities = config.cities.len(),
        provider = %config.provider_url,
        "Starting AQI Tracker"
    );

    // Open the reading store (creates the database on first run)
    let store = Arc::new(
        ReadingStore::open(&config.data_path, config.cities.clone())
            .await
            .with_context(|| format!("Failed to open store at {}", config.data_path.display()))?,
    );

    let client = WaqiClient::from_config(&config).context("Failed to build HTTP client")?;
    let monitor = CycleMonitor::new();
    let scheduler = Arc::new(FetchScheduler::new(
        client,
        store.clone(),
        monitor.clone(),
        &config,
    ));

    // One shutdown signal fans out to the server and the scheduler
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.run(async move {
        let _ = shutdown_rx.changed().await;
    }));

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        query: QueryService::new(store),
        monitor,
    });

    // Build router
    let app = aqi_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    scheduler_task.await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aqi_tracker=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
