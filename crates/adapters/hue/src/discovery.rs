//! Mapping of the bridge inventory onto scheduled lights and scenes.

use std::collections::{HashMap, HashSet};

use circadia_domain::light::{Light, MirekRange, Scene};
use circadia_domain::schedule::Schedule;

use crate::resources::{
    DEVICE, DeviceResource, GroupResource, LIGHT, LightResource, SceneResource,
    ZIGBEE_CONNECTIVITY,
};

/// Everything discovery needs, fetched in one pass.
#[derive(Debug, Default)]
pub struct Inventory {
    pub rooms: Vec<GroupResource>,
    pub zones: Vec<GroupResource>,
    pub devices: Vec<DeviceResource>,
    pub lights: Vec<LightResource>,
}

/// Light service ids of a group. Room children are devices, zone children
/// are light services.
fn group_light_ids<'a>(
    group: &'a GroupResource,
    devices: &HashMap<&str, &'a DeviceResource>,
) -> Vec<&'a str> {
    group
        .children
        .iter()
        .filter_map(|child| match child.rtype.as_str() {
            LIGHT => Some(child.rid.as_str()),
            DEVICE => devices
                .get(child.rid.as_str())
                .and_then(|device| device.service(LIGHT)),
            _ => None,
        })
        .collect()
}

/// Lights of every schedule's rooms and zones, tagged with the schedule.
///
/// A light reachable through several groups or schedules is kept once, for
/// the first schedule that lists it.
#[must_use]
pub fn map_lights(inventory: &Inventory, schedules: &[Schedule]) -> Vec<Light> {
    let devices: HashMap<&str, &DeviceResource> = inventory
        .devices
        .iter()
        .map(|device| (device.id.as_str(), device))
        .collect();
    let lights: HashMap<&str, &LightResource> = inventory
        .lights
        .iter()
        .map(|light| (light.id.as_str(), light))
        .collect();

    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for schedule in schedules {
        let groups = schedule
            .rooms
            .iter()
            .map(|name| (name, &inventory.rooms))
            .chain(schedule.zones.iter().map(|name| (name, &inventory.zones)));

        for (group_name, candidates) in groups {
            let Some(group) = candidates.iter().find(|g| &g.metadata.name == group_name) else {
                tracing::warn!(group = %group_name, schedule = %schedule.name, "group not found on bridge");
                continue;
            };
            for light_id in group_light_ids(group, &devices) {
                let Some(resource) = lights.get(light_id) else {
                    tracing::warn!(light = light_id, "light service missing from bridge");
                    continue;
                };
                if !seen.insert(light_id) {
                    continue;
                }
                let schema = resource.mirek_schema();
                let zigbee_id = devices
                    .get(resource.owner.rid.as_str())
                    .and_then(|device| device.service(ZIGBEE_CONNECTIVITY));
                let mut builder = Light::builder()
                    .id(light_id)
                    .name(resource.metadata.name.as_str())
                    .schedule_name(schedule.name.as_str())
                    .group_name(group_name.as_str())
                    .mirek_range(MirekRange::new(schema.mirek_minimum, schema.mirek_maximum))
                    .auto_on(schedule.auto_on)
                    .on(resource.on.on);
                if let Some(zigbee_id) = zigbee_id {
                    builder = builder.zigbee_id(zigbee_id);
                }
                match builder.build() {
                    Ok(light) => result.push(light),
                    Err(err) => tracing::warn!(%err, light = light_id, "skipping light"),
                }
            }
        }
    }
    result
}

/// Scenes named `<prefix><schedule name>`.
#[must_use]
pub fn map_scenes(scenes: &[SceneResource], schedules: &[Schedule], prefix: &str) -> Vec<Scene> {
    scenes
        .iter()
        .filter_map(|scene| {
            let schedule_name = scene.metadata.name.strip_prefix(prefix)?;
            let schedule = schedules.iter().find(|s| s.name == schedule_name)?;
            Some(Scene::new(
                scene.id.as_str(),
                scene.metadata.name.as_str(),
                schedule.name.as_str(),
            ))
        })
        .collect()
}
