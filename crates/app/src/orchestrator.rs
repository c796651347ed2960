//! Orchestrator: wires the services and runs the reconciliation loop.
//!
//! One cooperative loop selects between shutdown, bridge events and the
//! periodic tick. Each tick recomputes targets and starts a physical sync
//! in the background.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;

use circadia_domain::error::CircadiaError;
use circadia_domain::schedule::{ScheduleCatalog, ScheduleEngine};
use circadia_domain::time::now;

use crate::locks::LightLocks;
use crate::ports::{DeviceGateway, EventStream, LightStore};
use crate::services::logical_state::LogicalStateManager;
use crate::services::physical_sync::PhysicalSync;
use crate::settings::SyncSettings;
use crate::throttle::Throttle;

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Initializing,
    Running,
    Stopped,
}

pub struct Orchestrator<S, G> {
    catalog: ScheduleCatalog,
    gateway: Arc<G>,
    logical: LogicalStateManager<S, PhysicalSync<S, G>>,
    physical: Arc<PhysicalSync<S, G>>,
    settings: SyncSettings,
    state: OrchestratorState,
}

impl<S, G> Orchestrator<S, G>
where
    S: LightStore + 'static,
    G: DeviceGateway + 'static,
{
    /// Build the services around one shared throttle and one set of light
    /// locks.
    pub fn new(
        catalog: ScheduleCatalog,
        engine: ScheduleEngine,
        store: Arc<S>,
        gateway: Arc<G>,
        settings: SyncSettings,
    ) -> Self {
        let throttle = Arc::new(Throttle::new(settings.throttle_spacing));
        let locks = Arc::new(LightLocks::new());
        let physical = Arc::new(PhysicalSync::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            throttle,
            Arc::clone(&locks),
            engine.timezone(),
            settings.max_override_age,
        ));
        let logical = LogicalStateManager::new(
            store,
            Arc::clone(&physical),
            locks,
            engine,
            settings.settle_window,
        );
        Self {
            catalog,
            gateway,
            logical,
            physical,
            settings,
            state: OrchestratorState::Initializing,
        }
    }

    #[must_use]
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    #[must_use]
    pub fn catalog(&self) -> &ScheduleCatalog {
        &self.catalog
    }

    /// Enable or disable a schedule. Takes effect on the next tick.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for an unknown schedule name.
    pub fn set_schedule_enabled(&mut self, name: &str, enabled: bool) -> Result<(), CircadiaError> {
        self.catalog.set_enabled(name, enabled)?;
        tracing::info!(schedule = name, enabled, "schedule toggled");
        Ok(())
    }

    /// Discover and register the devices of every enabled schedule, then
    /// compute their first targets.
    ///
    /// # Errors
    ///
    /// Returns gateway or storage errors from discovery and registration.
    #[tracing::instrument(skip(self))]
    pub async fn initialise(&mut self) -> Result<(), CircadiaError> {
        let schedules = self.catalog.enabled_schedules();
        let lights = self.gateway.discover_lights(&schedules).await?;
        let scenes = self.gateway.discover_scenes(&schedules).await?;
        tracing::info!(lights = lights.len(), scenes = scenes.len(), "devices discovered");
        self.logical.register(lights, scenes).await?;
        self.logical
            .update_all_target_states(&self.catalog, now())
            .await;
        Ok(())
    }

    /// Run until `shutdown` resolves, then wait up to the drain timeout for
    /// background syncs to finish.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        self.state = OrchestratorState::Running;

        let mut events = match self.gateway.subscribe_to_events().await {
            Ok(stream) => Some(stream),
            Err(err) => {
                tracing::warn!(%err, "event subscription failed, running on ticks only");
                None
            }
        };
        let mut ticker = tokio::time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut syncs: Vec<JoinHandle<()>> = Vec::new();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                event = next_event(&mut events), if events.is_some() => match event {
                    Some(payload) => {
                        self.logical.handle_bridge_payload(&payload).await;
                    }
                    None => {
                        tracing::warn!("event stream closed");
                        events = None;
                    }
                },
                _ = ticker.tick() => {
                    self.logical
                        .update_all_target_states(&self.catalog, now())
                        .await;
                    syncs.retain(|handle| !handle.is_finished());
                    let physical = Arc::clone(&self.physical);
                    syncs.push(tokio::spawn(async move {
                        if let Err(err) = physical.sync_all(now()).await {
                            tracing::error!(%err, "sync failed");
                        }
                    }));
                }
            }
        }

        drop(events);
        self.drain(syncs).await;
        self.state = OrchestratorState::Stopped;
        tracing::info!("stopped");
    }

    async fn drain(&self, mut syncs: Vec<JoinHandle<()>>) {
        let pending = async {
            for handle in &mut syncs {
                if let Err(err) = handle.await {
                    tracing::error!(%err, "sync task failed");
                }
            }
        };
        if tokio::time::timeout(self.settings.drain_timeout, pending)
            .await
            .is_err()
        {
            tracing::warn!("syncs still running after drain timeout, aborting");
            for handle in &syncs {
                handle.abort();
            }
        }
    }
}

async fn next_event(events: &mut Option<EventStream>) -> Option<String> {
    match events {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
