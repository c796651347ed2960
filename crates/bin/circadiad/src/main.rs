//! # circadiad
//!
//! Composition root that wires all adapters together and runs the
//! reconciliation loop.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialize logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct the bridge gateway and the orchestrator
//! - Discover devices, then run until SIGTERM/SIGINT
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer, no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use circadia_adapter_hue::HueGateway;
use circadia_adapter_storage_sqlite_sqlx::SqliteLightStore;
use circadia_app::orchestrator::Orchestrator;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Database
    let db = circadia_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("opening database")?;
    let store = Arc::new(SqliteLightStore::new(db.pool().clone()));

    // Bridge
    let gateway = Arc::new(HueGateway::new(&config.bridge).context("building bridge client")?);

    let mut orchestrator = Orchestrator::new(
        config.catalog()?,
        config.schedule_engine()?,
        store,
        gateway,
        config.sync_settings(),
    );
    orchestrator
        .initialise()
        .await
        .context("discovering devices")?;

    tracing::info!(
        bridge = %config.bridge.address,
        schedules = orchestrator.catalog().schedules().len(),
        "circadiad running"
    );
    orchestrator.run(shutdown_signal()).await;

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            tracing::warn!(%err, "cannot listen for SIGTERM");
            wait_for_ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        () = wait_for_ctrl_c() => tracing::info!("received SIGINT"),
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
