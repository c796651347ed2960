//! CLIP v2 resource shapes, as far as this adapter reads or writes them.

use serde::{Deserialize, Serialize};

use circadia_domain::event::{ColorTemperaturePayload, DimmingPayload, OnPayload};
use circadia_domain::light::LightState;

pub const LIGHT: &str = "light";
pub const DEVICE: &str = "device";
pub const ZIGBEE_CONNECTIVITY: &str = "zigbee_connectivity";

/// Every CLIP v2 answer wraps its resources in `data`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
    pub data: Vec<T>,
}

/// Reference from one resource to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub rid: String,
    pub rtype: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub archetype: Option<String>,
}

/// A room or a zone.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupResource {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub children: Vec<ResourceRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceResource {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub services: Vec<ResourceRef>,
}

impl DeviceResource {
    /// First service of the given type.
    #[must_use]
    pub fn service(&self, rtype: &str) -> Option<&str> {
        self.services
            .iter()
            .find(|service| service.rtype == rtype)
            .map(|service| service.rid.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MirekSchema {
    pub mirek_minimum: u16,
    pub mirek_maximum: u16,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LightColorTemperature {
    #[serde(default)]
    pub mirek_schema: Option<MirekSchema>,
}

/// A light service.
#[derive(Debug, Clone, Deserialize)]
pub struct LightResource {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub owner: ResourceRef,
    pub on: OnPayload,
    #[serde(default)]
    pub color_temperature: Option<LightColorTemperature>,
}

impl LightResource {
    #[must_use]
    pub fn mirek_schema(&self) -> MirekSchema {
        self.color_temperature
            .and_then(|ct| ct.mirek_schema)
            .unwrap_or_default()
    }
}

/// Body of a light write. Only `on` is sent when switching off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightUpdate {
    pub on: OnPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimming: Option<DimmingPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<ColorTemperaturePayload>,
}

impl From<LightState> for LightUpdate {
    fn from(state: LightState) -> Self {
        if state.on {
            Self {
                on: OnPayload { on: true },
                dimming: Some(DimmingPayload {
                    brightness: f64::from(state.brightness),
                }),
                color_temperature: Some(ColorTemperaturePayload {
                    mirek: Some(state.temperature_mirek),
                }),
            }
        } else {
            Self {
                on: OnPayload { on: false },
                dimming: None,
                color_temperature: None,
            }
        }
    }
}

/// What a scene does to one light. Unknown attributes are written back
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<OnPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimming: Option<DimmingPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<ColorTemperaturePayload>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAction {
    pub target: ResourceRef,
    pub action: ActionBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneResource {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub actions: Vec<SceneAction>,
}

impl SceneResource {
    /// Point every action at `state`. Brightness and colour temperature are
    /// only rewritten when the state is on.
    pub fn apply(&mut self, state: LightState) {
        for action in &mut self.actions {
            action.action.on = Some(OnPayload { on: state.on });
            if state.on {
                action.action.dimming = Some(DimmingPayload {
                    brightness: f64::from(state.brightness),
                });
                action.action.color_temperature = Some(ColorTemperaturePayload {
                    mirek: Some(state.temperature_mirek),
                });
            }
        }
    }
}

/// Body of a scene write.
#[derive(Debug, Serialize)]
pub struct SceneUpdate<'a> {
    pub actions: &'a [SceneAction],
}
