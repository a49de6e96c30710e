//! # homesyncd: homesync daemon
//!
//! Composition root that wires the virtual gateway into the sync service.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Install the `tracing` subscriber
//! - Construct the gateway adapter and the in-process event bus
//! - Spawn the sync service and log every change event it publishes
//! - Replay the configured temperature schedule on the virtual thermometer
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer, and no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

use homesync_adapter_virtual::VirtualGateway;
use homesync_app::event_bus::InProcessEventBus;
use homesync_app::services::sync_service::SyncService;
use homesync_domain::event::StoreEvent;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .context("invalid logging filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Gateway
    let (gateway_tx, gateway_rx) = mpsc::channel(config.sync.event_capacity);
    let gateway = Arc::new(
        VirtualGateway::new(gateway_tx, config.virtual_home.initial_temperature)
            .context("failed to build the virtual home")?,
    );

    // Event bus
    let event_bus = InProcessEventBus::new(config.sync.event_capacity);
    let logger = tokio::spawn(log_events(event_bus.subscribe()));

    // Sync service
    let (service, handle) = SyncService::new(
        Arc::clone(&gateway),
        gateway_rx,
        event_bus,
        config.sync_config(),
    );
    let service_task = service.spawn();

    let schedule = tokio::spawn(drive_temperature(
        Arc::clone(&gateway),
        config.virtual_home.temperature_schedule.clone(),
        config.temperature_interval(),
    ));

    tracing::info!("homesyncd running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown requested");

    schedule.abort();
    handle.shutdown().await?;
    service_task.await.context("sync service task failed")?;
    logger.await.context("event logger task failed")?;

    Ok(())
}

/// Log every published change event as JSON until the bus closes.
async fn log_events(mut events: broadcast::Receiver<StoreEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => tracing::info!(kind = event.kind(), event = %json, "store event"),
                Err(err) => tracing::warn!(%err, kind = event.kind(), "unserializable store event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event logger lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Replay `schedule` on the virtual thermometer, one step per `interval`.
async fn drive_temperature(gateway: Arc<VirtualGateway>, schedule: Vec<f64>, interval: Duration) {
    if schedule.is_empty() {
        tracing::info!("temperature schedule empty, thermometer stays put");
        return;
    }
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; keep the initial temperature for one interval.
    ticker.tick().await;
    for celsius in schedule.iter().cycle() {
        ticker.tick().await;
        gateway.set_temperature(*celsius);
    }
}
