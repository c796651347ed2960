//! Logical state manager: keeps stored targets and overrides current.
//!
//! Targets come from the schedule engine on every tick. Bridge events are
//! classified as echoes of our own pushes, manual overrides, or noise; a
//! light switched back on by hand is pushed straight to its target.

use std::sync::Arc;

use circadia_domain::error::CircadiaError;
use circadia_domain::event::{ConnectivityStatus, DeviceChange, EventBatch, parse_batches};
use circadia_domain::id::LightId;
use circadia_domain::light::{Light, Override, Scene};
use circadia_domain::schedule::{ScheduleCatalog, ScheduleEngine};
use circadia_domain::time::Timestamp;

use crate::locks::LightLocks;
use crate::ports::LightStore;
use crate::services::physical_sync::{LightStateSetter, PushOutcome};

/// Attribute reported by a value-change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Brightness,
    ColourTemp,
}

impl ChangeKind {
    /// Largest difference from the target still considered an echo.
    #[must_use]
    pub fn tolerance(self) -> u16 {
        match self {
            Self::Brightness => 1,
            Self::ColourTemp => 5,
        }
    }
}

/// What handling a single event item did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Ignored,
    OverrideRecorded,
    OverridesCleared,
    MarkedUnreachable,
    Pushed(PushOutcome),
}

enum Decision {
    Done(EventOutcome),
    Push,
}

/// Writes targets and classifies bridge events.
pub struct LogicalStateManager<S, P> {
    store: Arc<S>,
    setter: Arc<P>,
    locks: Arc<LightLocks>,
    engine: ScheduleEngine,
    settle_window: chrono::Duration,
}

impl<S, P> LogicalStateManager<S, P>
where
    S: LightStore,
    P: LightStateSetter,
{
    pub fn new(
        store: Arc<S>,
        setter: Arc<P>,
        locks: Arc<LightLocks>,
        engine: ScheduleEngine,
        settle_window: chrono::Duration,
    ) -> Self {
        Self {
            store,
            setter,
            locks,
            engine,
            settle_window,
        }
    }

    /// Store discovered lights and scenes.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    #[tracing::instrument(skip_all, fields(lights = lights.len(), scenes = scenes.len()))]
    pub async fn register(&self, lights: Vec<Light>, scenes: Vec<Scene>) -> Result<(), CircadiaError> {
        self.store.add_lights(lights).await?;
        self.store.add_scenes(scenes).await
    }

    /// Recompute and store the target of every enabled schedule at `t`.
    ///
    /// Schedules that fail to resolve or store are logged and skipped.
    /// Returns the number of schedules updated.
    #[tracing::instrument(skip(self, catalog))]
    pub async fn update_all_target_states(&self, catalog: &ScheduleCatalog, t: Timestamp) -> usize {
        let mut updated = 0;
        for (schedule, pattern) in catalog.enabled() {
            let interval = match self.engine.resolve_interval(schedule, pattern, t) {
                Ok(interval) => interval,
                Err(err) => {
                    tracing::error!(%err, schedule = %schedule.name, "skipping schedule");
                    continue;
                }
            };
            let state = interval.calculate_target_light_state(t);
            match self.store.update_target_state(&schedule.name, state).await {
                Ok(()) => {
                    tracing::debug!(
                        schedule = %schedule.name,
                        brightness = state.brightness,
                        mirek = state.temperature_mirek,
                        on = state.on,
                        "target updated"
                    );
                    updated += 1;
                }
                Err(err) => {
                    tracing::error!(%err, schedule = %schedule.name, "failed to store target");
                }
            }
        }
        updated
    }

    /// Parse and handle one raw event-stream message.
    ///
    /// Malformed messages are logged and dropped.
    pub async fn handle_bridge_payload(&self, payload: &str) -> Vec<(LightId, EventOutcome)> {
        match parse_batches(payload) {
            Ok(batches) => {
                let mut outcomes = Vec::new();
                for batch in &batches {
                    outcomes.extend(self.handle_event_batch(batch).await);
                }
                outcomes
            }
            Err(err) => {
                tracing::error!(%err, "malformed event payload");
                Vec::new()
            }
        }
    }

    /// Handle every item of an `update` batch. Other batch types are ignored.
    ///
    /// Items that fail are logged and do not stop the rest of the batch.
    pub async fn handle_event_batch(&self, batch: &EventBatch) -> Vec<(LightId, EventOutcome)> {
        let mut outcomes = Vec::new();
        if !batch.is_update() {
            return outcomes;
        }
        for item in &batch.data {
            let change = item.classify();
            if let Err(err) = self
                .handle_change(batch.creation_time, change, &mut outcomes)
                .await
            {
                tracing::warn!(%err, item = %item.id, "failed to handle event");
            }
        }
        outcomes
    }

    async fn handle_change(
        &self,
        event_time: Timestamp,
        change: DeviceChange,
        outcomes: &mut Vec<(LightId, EventOutcome)>,
    ) -> Result<(), CircadiaError> {
        match change {
            DeviceChange::Connectivity { zigbee_id, status } => {
                let Some(light_id) = self
                    .store
                    .get_light_service_id_for_zigbee_id(&zigbee_id)
                    .await?
                else {
                    return Ok(());
                };
                let outcome = match status {
                    ConnectivityStatus::ConnectivityIssue => {
                        let _guard = self.locks.lock(&light_id).await;
                        self.store.set_light_unreachable(&light_id).await?;
                        tracing::info!(light = %light_id, "light unreachable");
                        EventOutcome::MarkedUnreachable
                    }
                    ConnectivityStatus::Connected => {
                        self.settle_on_off(event_time, &light_id, true, true)
                            .await?
                    }
                    ConnectivityStatus::Other => return Ok(()),
                };
                outcomes.push((light_id, outcome));
            }
            DeviceChange::Light {
                light_id,
                on,
                brightness,
                mirek,
            } => {
                if !self.store.is_scheduled_light(&light_id).await? {
                    return Ok(());
                }
                if let Some(on) = on {
                    self.store.set_light_on_state(&light_id, on).await?;
                    let outcome = self
                        .handle_light_on_off_event(event_time, &light_id, on)
                        .await?;
                    outcomes.push((light_id, outcome));
                    return Ok(());
                }
                if let Some(value) = brightness {
                    let outcome = self
                        .handle_light_change_event(
                            ChangeKind::Brightness,
                            event_time,
                            &light_id,
                            u16::from(value),
                        )
                        .await?;
                    outcomes.push((light_id.clone(), outcome));
                }
                if let Some(value) = mirek {
                    let outcome = self
                        .handle_light_change_event(
                            ChangeKind::ColourTemp,
                            event_time,
                            &light_id,
                            value,
                        )
                        .await?;
                    outcomes.push((light_id, outcome));
                }
            }
            DeviceChange::Ignored => {}
        }
        Ok(())
    }

    /// Event lies within the settle window after the last push, or after
    /// itself when the light was never pushed.
    async fn in_settle_window(
        &self,
        light_id: &LightId,
        event_time: Timestamp,
    ) -> Result<bool, CircadiaError> {
        let reference = self
            .store
            .get_light_last_update(light_id)
            .await?
            .unwrap_or(event_time);
        Ok(event_time < reference + self.settle_window)
    }

    /// Classify an on/off report against the light's target.
    ///
    /// A matching report inside the settle window is an echo. A differing
    /// report is recorded as an on-state override. A matching report outside
    /// the window means someone switched the light back, so it is pushed to
    /// its full target.
    ///
    /// # Errors
    ///
    /// Returns storage errors and non-reachability push errors.
    #[tracing::instrument(skip(self))]
    pub async fn handle_light_on_off_event(
        &self,
        event_time: Timestamp,
        light_id: &LightId,
        event_on: bool,
    ) -> Result<EventOutcome, CircadiaError> {
        self.settle_on_off(event_time, light_id, event_on, false)
            .await
    }

    /// With `reconnected`, the light is flagged reachable under the same
    /// lock as the classification, so no push can interleave.
    async fn settle_on_off(
        &self,
        event_time: Timestamp,
        light_id: &LightId,
        event_on: bool,
        reconnected: bool,
    ) -> Result<EventOutcome, CircadiaError> {
        let decision = {
            let _guard = self.locks.lock(light_id).await;
            if reconnected {
                self.store.mark_light_reachable(light_id).await?;
                tracing::info!(light = %light_id, "light reachable again");
            }
            let target_on = self.store.get_light_target_state(light_id).await?.state.on;

            if event_on == target_on && self.in_settle_window(light_id, event_time).await? {
                tracing::debug!("echo of last push, ignoring");
                Decision::Done(EventOutcome::Ignored)
            } else if event_on != target_on {
                self.store
                    .set_light_on_state_override(
                        light_id,
                        Override {
                            value: event_on,
                            target_at_override: target_on,
                            at: event_time,
                        },
                    )
                    .await?;
                tracing::info!(event_on, target_on, "on-state override recorded");
                Decision::Done(EventOutcome::OverrideRecorded)
            } else {
                Decision::Push
            }
        };

        match decision {
            Decision::Done(outcome) => Ok(outcome),
            Decision::Push => {
                tracing::debug!("pushing light to target");
                let pushed = self
                    .setter
                    .set_light_state_to_target(light_id, event_time)
                    .await?;
                Ok(EventOutcome::Pushed(pushed))
            }
        }
    }

    /// Classify a brightness or colour temperature report.
    ///
    /// Zero is noise. A value within tolerance of the target is an echo and
    /// clears any overrides. Inside the settle window anything else is noise
    /// trailing our push; outside it the value is recorded as an override.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    #[tracing::instrument(skip(self))]
    pub async fn handle_light_change_event(
        &self,
        kind: ChangeKind,
        event_time: Timestamp,
        light_id: &LightId,
        event_value: u16,
    ) -> Result<EventOutcome, CircadiaError> {
        if event_value == 0 {
            return Ok(EventOutcome::Ignored);
        }

        let _guard = self.locks.lock(light_id).await;
        let target = self.store.get_light_target_state(light_id).await?.state;
        let target_value = match kind {
            ChangeKind::Brightness => u16::from(target.brightness),
            ChangeKind::ColourTemp => target.temperature_mirek,
        };

        if event_value.abs_diff(target_value) <= kind.tolerance() {
            self.store.clear_light_overrides(light_id).await?;
            return Ok(EventOutcome::OverridesCleared);
        }
        if self.in_settle_window(light_id, event_time).await? {
            tracing::debug!(event_value, target_value, "inside settle window, ignoring");
            return Ok(EventOutcome::Ignored);
        }

        match kind {
            ChangeKind::Brightness => {
                let value = Override {
                    value: u8::try_from(event_value).unwrap_or(u8::MAX),
                    target_at_override: target.brightness,
                    at: event_time,
                };
                self.store
                    .set_light_brightness_override(light_id, value)
                    .await?;
            }
            ChangeKind::ColourTemp => {
                let value = Override {
                    value: event_value,
                    target_at_override: target.temperature_mirek,
                    at: event_time,
                };
                self.store
                    .set_light_colour_temp_override(light_id, value)
                    .await?;
            }
        }
        tracing::info!(?kind, event_value, target_value, "override recorded");
        Ok(EventOutcome::OverrideRecorded)
    }
}
