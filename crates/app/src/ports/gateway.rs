//! Device gateway port: the lighting bridge as seen by the core.

use std::future::Future;
use std::pin::Pin;

use tokio_stream::Stream;

use circadia_domain::error::CircadiaError;
use circadia_domain::id::{LightId, SceneId};
use circadia_domain::light::{Light, LightState, Scene};
use circadia_domain::schedule::Schedule;

/// Raw event-stream messages, each a JSON array of event batches.
///
/// Dropping the stream unsubscribes.
pub type EventStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Applies state to hardware and discovers topology.
pub trait DeviceGateway: Send + Sync {
    /// Lights in the rooms and zones of the given schedules, each tagged with
    /// the schedule that owns it.
    fn discover_lights(
        &self,
        schedules: &[Schedule],
    ) -> impl Future<Output = Result<Vec<Light>, CircadiaError>> + Send;

    /// Scenes kept in step with the given schedules.
    fn discover_scenes(
        &self,
        schedules: &[Schedule],
    ) -> impl Future<Output = Result<Vec<Scene>, CircadiaError>> + Send;

    /// Push a state to one light.
    ///
    /// Fails with [`CircadiaError::Unreachable`] when the bridge accepted the
    /// command but could not deliver it.
    fn update_light_state(
        &self,
        id: &LightId,
        state: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    fn update_scene_state(
        &self,
        id: &SceneId,
        state: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send;

    fn subscribe_to_events(
        &self,
    ) -> impl Future<Output = Result<EventStream, CircadiaError>> + Send;
}
