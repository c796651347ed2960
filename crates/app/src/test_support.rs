//! In-memory fakes of the ports, shared by the service tests.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;

use circadia_domain::error::{CircadiaError, NotFoundError};
use circadia_domain::id::{LightId, SceneId, ZigbeeId};
use circadia_domain::light::{Light, LightState, LightTarget, Override, Scene};
use circadia_domain::schedule::Schedule;
use circadia_domain::time::Timestamp;

use crate::ports::{DeviceGateway, EventStream, LightStore};

fn not_found(entity: &'static str, id: impl ToString) -> CircadiaError {
    NotFoundError {
        entity,
        id: id.to_string(),
    }
    .into()
}

#[derive(Default)]
pub struct InMemoryLightStore {
    pub lights: Mutex<HashMap<LightId, Light>>,
    pub scenes: Mutex<HashMap<SceneId, Scene>>,
}

impl InMemoryLightStore {
    pub fn with_lights(lights: Vec<Light>) -> Self {
        let store = Self::default();
        {
            let mut map = store.lights.lock().unwrap();
            for light in lights {
                map.insert(light.id.clone(), light);
            }
        }
        store
    }

    pub fn light(&self, id: &str) -> Light {
        self.lights.lock().unwrap()[&LightId::new(id)].clone()
    }

    fn with_light<T>(
        &self,
        id: &LightId,
        f: impl FnOnce(&mut Light) -> T,
    ) -> Result<T, CircadiaError> {
        let mut lights = self.lights.lock().unwrap();
        let light = lights.get_mut(id).ok_or_else(|| not_found("Light", id))?;
        Ok(f(light))
    }
}

impl LightStore for InMemoryLightStore {
    fn add_lights(
        &self,
        lights: Vec<Light>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let mut map = self.lights.lock().unwrap();
        for light in lights {
            map.entry(light.id.clone()).or_insert(light);
        }
        async { Ok(()) }
    }

    fn add_scenes(
        &self,
        scenes: Vec<Scene>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let mut map = self.scenes.lock().unwrap();
        for scene in scenes {
            map.insert(scene.id.clone(), scene);
        }
        async { Ok(()) }
    }

    fn get_light(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<Option<Light>, CircadiaError>> + Send {
        let result = self.lights.lock().unwrap().get(id).cloned();
        async { Ok(result) }
    }

    fn get_light_target_state(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<LightTarget, CircadiaError>> + Send {
        let result = self
            .with_light(id, |light| light.target_state())
            .and_then(|target| target.ok_or_else(|| not_found("LightTarget", id)));
        async { result }
    }

    fn get_scene_target_state(
        &self,
        id: &SceneId,
    ) -> impl Future<Output = Result<LightState, CircadiaError>> + Send {
        let result = self
            .scenes
            .lock()
            .unwrap()
            .get(id)
            .and_then(|scene| scene.target)
            .ok_or_else(|| not_found("SceneTarget", id));
        async { result }
    }

    fn update_target_state(
        &self,
        schedule_name: &str,
        state: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        for light in self.lights.lock().unwrap().values_mut() {
            if light.schedule_name == schedule_name {
                light.target = Some(state);
            }
        }
        for scene in self.scenes.lock().unwrap().values_mut() {
            if scene.schedule_name == schedule_name {
                scene.target = Some(state);
            }
        }
        async { Ok(()) }
    }

    fn set_light_unreachable(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let result = self.with_light(id, Light::mark_unreachable);
        async { result }
    }

    fn mark_light_reachable(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let result = self.with_light(id, |light| light.reachable = true);
        async { result }
    }

    fn set_light_on_state(
        &self,
        id: &LightId,
        on: bool,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let result = self.with_light(id, |light| light.on = on);
        async { result }
    }

    fn set_light_on_state_override(
        &self,
        id: &LightId,
        value: Override<bool>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let result = self.with_light(id, |light| light.overrides.on = Some(value));
        async { result }
    }

    fn set_light_brightness_override(
        &self,
        id: &LightId,
        value: Override<u8>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let result = self.with_light(id, |light| light.overrides.brightness = Some(value));
        async { result }
    }

    fn set_light_colour_temp_override(
        &self,
        id: &LightId,
        value: Override<u16>,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let result = self.with_light(id, |light| light.overrides.colour_temp = Some(value));
        async { result }
    }

    fn clear_light_overrides(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let result = self.with_light(id, |light| light.overrides = Default::default());
        async { result }
    }

    fn is_scheduled_light(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<bool, CircadiaError>> + Send {
        let result = self.lights.lock().unwrap().contains_key(id);
        async move { Ok(result) }
    }

    fn get_light_service_id_for_zigbee_id(
        &self,
        id: &ZigbeeId,
    ) -> impl Future<Output = Result<Option<LightId>, CircadiaError>> + Send {
        let result = self
            .lights
            .lock()
            .unwrap()
            .values()
            .find(|light| light.zigbee_id.as_ref() == Some(id))
            .map(|light| light.id.clone());
        async { Ok(result) }
    }

    fn get_light_last_update(
        &self,
        id: &LightId,
    ) -> impl Future<Output = Result<Option<Timestamp>, CircadiaError>> + Send {
        let result = self.with_light(id, |light| light.last_update.map(|s| s.at));
        async { result }
    }

    fn get_all_controlling_light_ids(
        &self,
        override_cutoff: Timestamp,
    ) -> impl Future<Output = Result<Vec<LightId>, CircadiaError>> + Send {
        let mut result: Vec<LightId> = self
            .lights
            .lock()
            .unwrap()
            .values()
            .filter(|light| light.is_sync_candidate(override_cutoff))
            .map(|light| light.id.clone())
            .collect();
        result.sort();
        async { Ok(result) }
    }

    fn get_all_scene_ids(
        &self,
    ) -> impl Future<Output = Result<Vec<SceneId>, CircadiaError>> + Send {
        let mut result: Vec<SceneId> = self.scenes.lock().unwrap().keys().cloned().collect();
        result.sort();
        async { Ok(result) }
    }

    fn mark_light_as_updated(
        &self,
        id: &LightId,
        at: Timestamp,
        applied: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let result = self.with_light(id, |light| light.mark_updated(at, applied));
        async { result }
    }
}

/// Records every device call. Lights listed in `unreachable` answer with
/// [`CircadiaError::Unreachable`].
#[derive(Default)]
pub struct FakeGateway {
    pub lights: Vec<Light>,
    pub scenes: Vec<Scene>,
    pub events: Mutex<Vec<String>>,
    pub unreachable: Mutex<HashSet<LightId>>,
    pub light_updates: Mutex<Vec<(LightId, LightState)>>,
    pub scene_updates: Mutex<Vec<(SceneId, LightState)>>,
}

impl FakeGateway {
    pub fn light_updates(&self) -> Vec<(LightId, LightState)> {
        self.light_updates.lock().unwrap().clone()
    }

    pub fn scene_updates(&self) -> Vec<(SceneId, LightState)> {
        self.scene_updates.lock().unwrap().clone()
    }
}

impl DeviceGateway for FakeGateway {
    fn discover_lights(
        &self,
        schedules: &[Schedule],
    ) -> impl Future<Output = Result<Vec<Light>, CircadiaError>> + Send {
        let result = self
            .lights
            .iter()
            .filter(|light| schedules.iter().any(|s| s.name == light.schedule_name))
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn discover_scenes(
        &self,
        schedules: &[Schedule],
    ) -> impl Future<Output = Result<Vec<Scene>, CircadiaError>> + Send {
        let result = self
            .scenes
            .iter()
            .filter(|scene| schedules.iter().any(|s| s.name == scene.schedule_name))
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn update_light_state(
        &self,
        id: &LightId,
        state: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        let result = if self.unreachable.lock().unwrap().contains(id) {
            Err(CircadiaError::Unreachable(id.to_string()))
        } else {
            self.light_updates.lock().unwrap().push((id.clone(), state));
            Ok(())
        };
        async { result }
    }

    fn update_scene_state(
        &self,
        id: &SceneId,
        state: LightState,
    ) -> impl Future<Output = Result<(), CircadiaError>> + Send {
        self.scene_updates.lock().unwrap().push((id.clone(), state));
        async { Ok(()) }
    }

    fn subscribe_to_events(
        &self,
    ) -> impl Future<Output = Result<EventStream, CircadiaError>> + Send {
        let events = std::mem::take(&mut *self.events.lock().unwrap());
        let stream: EventStream = Box::pin(tokio_stream::iter(events));
        async { Ok(stream) }
    }
}
