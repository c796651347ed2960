//! Physical sync: pushes stored targets to devices.
//!
//! Scenes are refreshed on every run. Lights are pushed only when their
//! target moved since the last push, they are reachable, and no fresh
//! manual override holds them back.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono_tz::Tz;

use circadia_domain::error::CircadiaError;
use circadia_domain::id::{LightId, SceneId};
use circadia_domain::time::{Timestamp, local_time};

use crate::locks::LightLocks;
use crate::ports::{DeviceGateway, LightStore};
use crate::throttle::Throttle;

/// Result of pushing one light to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Applied,
    /// The light is off and may not be switched on at this time of day.
    SkippedAutoOn,
    /// The bridge could not reach the light; it is now flagged unreachable.
    Unreachable,
}

/// Pushes a light to its stored target.
pub trait LightStateSetter: Send + Sync {
    /// `now` is recorded as the push time.
    fn set_light_state_to_target(
        &self,
        id: &LightId,
        now: Timestamp,
    ) -> impl Future<Output = Result<PushOutcome, CircadiaError>> + Send;
}

/// Counters of one [`PhysicalSync::sync_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub scenes_pushed: usize,
    pub lights_pushed: usize,
    pub lights_skipped: usize,
    pub lights_unreachable: usize,
    pub failures: usize,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Throttled writer of device state.
pub struct PhysicalSync<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    throttle: Arc<Throttle>,
    locks: Arc<LightLocks>,
    tz: Tz,
    max_override_age: chrono::Duration,
    busy: AtomicBool,
}

impl<S, G> PhysicalSync<S, G>
where
    S: LightStore,
    G: DeviceGateway,
{
    /// Create a sync sharing the throttle and light locks with the rest of
    /// the application.
    pub fn new(
        store: Arc<S>,
        gateway: Arc<G>,
        throttle: Arc<Throttle>,
        locks: Arc<LightLocks>,
        tz: Tz,
        max_override_age: chrono::Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            throttle,
            locks,
            tz,
            max_override_age,
            busy: AtomicBool::new(false),
        }
    }

    /// Push every scene, then every candidate light.
    ///
    /// Returns `None` without doing anything when another run is still in
    /// progress. Failures of single scenes or lights are logged and counted,
    /// never returned.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the scene or candidate list cannot be
    /// read.
    #[tracing::instrument(skip(self))]
    pub async fn sync_all(&self, now: Timestamp) -> Result<Option<SyncReport>, CircadiaError> {
        let Some(_busy) = BusyGuard::try_acquire(&self.busy) else {
            tracing::debug!("previous sync still running, skipping");
            return Ok(None);
        };
        let mut report = SyncReport::default();

        for scene_id in self.store.get_all_scene_ids().await? {
            match self.push_scene(&scene_id).await {
                Ok(()) => report.scenes_pushed += 1,
                Err(err) => {
                    tracing::warn!(%err, scene = %scene_id, "failed to update scene");
                    report.failures += 1;
                }
            }
        }

        let cutoff = now - self.max_override_age;
        for light_id in self.store.get_all_controlling_light_ids(cutoff).await? {
            match self.set_light_state_to_target(&light_id, now).await {
                Ok(PushOutcome::Applied) => report.lights_pushed += 1,
                Ok(PushOutcome::SkippedAutoOn) => report.lights_skipped += 1,
                Ok(PushOutcome::Unreachable) => report.lights_unreachable += 1,
                Err(err) => {
                    tracing::warn!(%err, light = %light_id, "failed to update light");
                    report.failures += 1;
                }
            }
        }

        tracing::info!(
            scenes = report.scenes_pushed,
            lights = report.lights_pushed,
            skipped = report.lights_skipped,
            unreachable = report.lights_unreachable,
            failures = report.failures,
            "sync finished"
        );
        Ok(Some(report))
    }

    async fn push_scene(&self, id: &SceneId) -> Result<(), CircadiaError> {
        let target = self.store.get_scene_target_state(id).await?;
        let _permit = self.throttle.acquire().await;
        self.gateway.update_scene_state(id, target).await
    }
}

impl<S, G> LightStateSetter for PhysicalSync<S, G>
where
    S: LightStore,
    G: DeviceGateway,
{
    #[tracing::instrument(skip(self))]
    async fn set_light_state_to_target(
        &self,
        id: &LightId,
        now: Timestamp,
    ) -> Result<PushOutcome, CircadiaError> {
        let _guard = self.locks.lock(id).await;
        let target = self.store.get_light_target_state(id).await?;

        if target.blocks_auto_on(local_time(self.tz, now)) {
            tracing::debug!("outside auto-on window, leaving light off");
            return Ok(PushOutcome::SkippedAutoOn);
        }

        let pushed = {
            let _permit = self.throttle.acquire().await;
            self.gateway.update_light_state(id, target.state).await
        };

        match pushed {
            Ok(()) => {
                self.store
                    .mark_light_as_updated(id, now, target.state)
                    .await?;
                Ok(PushOutcome::Applied)
            }
            Err(CircadiaError::Unreachable(_)) => {
                tracing::warn!("light unreachable");
                self.store.set_light_unreachable(id).await?;
                Ok(PushOutcome::Unreachable)
            }
            Err(err) => Err(err),
        }
    }
}
