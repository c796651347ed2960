//! Bridge events: batches of device changes pushed by the bridge.
//!
//! The bridge sends a JSON array of batches per message. Only batches of
//! type `update` carry state changes; each item is either a light service
//! or the zigbee connectivity service of a device.

use serde::{Deserialize, Serialize};

use crate::id::{LightId, ZigbeeId};
use crate::time::Timestamp;

pub const UPDATE_BATCH: &str = "update";
pub const LIGHT_ITEM: &str = "light";
pub const ZIGBEE_ITEM: &str = "zigbee_connectivity";

/// One batch of changes sharing a creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    #[serde(rename = "creationtime")]
    pub creation_time: Timestamp,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Vec<EventData>,
}

impl EventBatch {
    #[must_use]
    pub fn is_update(&self) -> bool {
        self.kind == UPDATE_BATCH
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnPayload {
    pub on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimmingPayload {
    pub brightness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorTemperaturePayload {
    /// Absent when the light is in colour mode.
    #[serde(default)]
    pub mirek: Option<u16>,
}

/// A single changed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub on: Option<OnPayload>,
    #[serde(default)]
    pub dimming: Option<DimmingPayload>,
    #[serde(default)]
    pub color_temperature: Option<ColorTemperaturePayload>,
}

/// Reachability as reported by a zigbee connectivity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityStatus {
    Connected,
    ConnectivityIssue,
    Other,
}

impl ConnectivityStatus {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("connected") => Self::Connected,
            Some("connectivity_issue") => Self::ConnectivityIssue,
            _ => Self::Other,
        }
    }
}

/// A typed view of an [`EventData`] item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceChange {
    Connectivity {
        zigbee_id: ZigbeeId,
        status: ConnectivityStatus,
    },
    Light {
        light_id: LightId,
        on: Option<bool>,
        brightness: Option<u8>,
        mirek: Option<u16>,
    },
    Ignored,
}

impl EventData {
    /// Classify the item by resource type.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn classify(&self) -> DeviceChange {
        match self.kind.as_str() {
            ZIGBEE_ITEM => DeviceChange::Connectivity {
                zigbee_id: ZigbeeId::new(self.id.clone()),
                status: ConnectivityStatus::parse(self.status.as_deref()),
            },
            LIGHT_ITEM => DeviceChange::Light {
                light_id: LightId::new(self.id.clone()),
                on: self.on.map(|payload| payload.on),
                brightness: self
                    .dimming
                    .map(|payload| payload.brightness.round().clamp(0.0, 100.0) as u8),
                mirek: self.color_temperature.and_then(|payload| payload.mirek),
            },
            _ => DeviceChange::Ignored,
        }
    }
}

/// Parse one event-stream message into its batches.
///
/// # Errors
///
/// Returns the underlying JSON error when the payload is malformed.
pub fn parse_batches(payload: &str) -> Result<Vec<EventBatch>, serde_json::Error> {
    serde_json::from_str(payload)
}
