//! Storage port: durable record of lights and scenes.
//!
//! Every method is a single atomic operation on one row (or one schedule's
//! rows). Read-decide-write sequences spanning several calls are serialised
//! per light by the caller.

use std::future::Future;

use circadia_domain::error::CircadiaError;
use circadia_domain::id::{LightId, SceneId, ZigbeeId};
use circadia_domain::light::{Light, LightState, LightTarget, Override, Scene};
use circadia_domain::time::Timestamp;

/// Persistence of light and scene state.
pub trait LightStore: Send + Sync {
    /// Register discovered lights. Existing lights keep their runtime state.
    fn add_lights(
        &self,
        lights: Vec<Light>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    /// Register discovered scenes.
    fn add_scenes(
        &self,
        scenes: Vec<Scene>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    fn get_light(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<Option<Light>, CircadiaError>> + Send;

    /// Target state with colour temperature clamped to the light's range,
    /// its auto-on window and its observed on-state.
    ///
    /// Fails with [`CircadiaError::NotFound`] for unknown lights and lights
    /// without a target yet.
    fn get_light_target_state(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<LightTarget, CircadiaError>> + Send;

    fn get_scene_target_state(
        &self,
        id: &SceneId,
    ) -> impl Future<Output = Result<LightState, CircadiaError>> + Send;

    /// Set the target of every light and scene owned by `schedule_name`.
    fn update_target_state(
        &self,
        schedule_name: &str,
        state: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    /// Flag the light unreachable and clear its overrides.
    fn set_light_unreachable(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    fn mark_light_reachable(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    /// Record the on-state observed on the device.
    fn set_light_on_state(
        &self,
        id: &LightId,
        on: bool,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    fn set_light_on_state_override(
        &self,
        id: &LightId,
        value: Override<bool>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    fn set_light_brightness_override(
        &self,
        id: &LightId,
        value: Override<u8>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    fn set_light_colour_temp_override(
        &self,
        id: &LightId,
        value: Override<u16>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    fn clear_light_overrides(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    /// Whether the id belongs to a light driven by a schedule.
    fn is_scheduled_light(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<bool, CircadiaError>> + Send;

    fn get_light_service_id_for_zigbee_id(
        &self,
        id: &ZigbeeId,
    ) -> impl Future<Output = Result<Option<LightId>, CircadiaError>> + Send;

    /// Time of the last successful push, if any.
    fn get_light_last_update(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<Option<Timestamp>, CircadiaError>> + Send;

    /// Lights whose clamped target differs from the last push, that are reachable,
    /// and whose overrides (if any) are not newer than `override_cutoff`.
    fn get_all_controlling_light_ids(
        &self,
        override_cutoff: Timestamp,
    ) -> impl Future<Output = Result<Vec<LightId>, CircadiaError>> + Send;

    fn get_all_scene_ids(&self)
    -> impl Future<Output = Result<Vec<SceneId>, CircadiaError>> + Send;

    /// Record `applied`, the state sent to the device, as the snapshot taken
    /// at `at`. Clears the unreachable flag and all overrides. The stored
    /// target is left alone, so a target that moved during the push keeps
    /// the light a candidate.
    fn mark_light_as_updated(
        &self,
        id: &LightId,
        at: Timestamp,
        applied: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;
}
