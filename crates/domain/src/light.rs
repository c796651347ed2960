//! Light: a schedule-controlled light service, plus its scene counterpart.
//!
//! A [`Light`] carries three views of its state: the target computed from
//! its schedule, the snapshot last pushed to the device, and any manual
//! overrides observed since.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{CircadiaError, ValidationError};
use crate::id::{LightId, SceneId, ZigbeeId};
use crate::schedule::AutoOnWindow;
use crate::time::Timestamp;

/// Brightness, colour temperature and power of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    /// Percentage, 0 to 100.
    pub brightness: u8,
    pub temperature_mirek: u16,
    pub on: bool,
}

impl LightState {
    pub const OFF: Self = Self {
        brightness: 0,
        temperature_mirek: 0,
        on: false,
    };
}

/// Colour temperature bounds reported by the device. A bound of 0 is unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirekRange {
    pub min: u16,
    pub max: u16,
}

impl MirekRange {
    #[must_use]
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// Clamp `mirek` into the known bounds.
    #[must_use]
    pub fn clamp(self, mirek: u16) -> u16 {
        let mut value = mirek;
        if self.min > 0 && value < self.min {
            value = self.min;
        }
        if self.max > 0 && value > self.max {
            value = self.max;
        }
        value
    }
}

/// The target of a light, with the context needed to decide whether turning
/// it on right now is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightTarget {
    /// Target with the colour temperature already clamped to the device range.
    pub state: LightState,
    pub auto_on: Option<AutoOnWindow>,
    /// Last known on-state of the physical light.
    pub current_on: bool,
}

impl LightTarget {
    /// Whether pushing this target would switch a light on outside its
    /// auto-on window. `local_time` is the wall-clock time in the
    /// configured timezone.
    #[must_use]
    pub fn blocks_auto_on(&self, local_time: NaiveTime) -> bool {
        match self.auto_on {
            Some(window) if !self.current_on && self.state.on => !window.contains(local_time),
            _ => false,
        }
    }
}

/// A manual change to a single attribute, together with the target value it
/// deviated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override<T> {
    pub value: T,
    pub target_at_override: T,
    pub at: Timestamp,
}

/// Per-attribute overrides of a light.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightOverrides {
    pub on: Option<Override<bool>>,
    pub brightness: Option<Override<u8>>,
    pub colour_temp: Option<Override<u16>>,
}

impl LightOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.on.is_none() && self.brightness.is_none() && self.colour_temp.is_none()
    }

    /// Most recent override time across all attributes.
    #[must_use]
    pub fn latest(&self) -> Option<Timestamp> {
        [
            self.on.map(|o| o.at),
            self.brightness.map(|o| o.at),
            self.colour_temp.map(|o| o.at),
        ]
        .into_iter()
        .flatten()
        .max()
    }

    /// An override is active until it is older than the cutoff.
    #[must_use]
    pub fn is_active(&self, cutoff: Timestamp) -> bool {
        self.latest().is_some_and(|at| at > cutoff)
    }
}

/// What was last pushed to the device, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedSnapshot {
    pub at: Timestamp,
    pub state: LightState,
}

/// A light service driven by one schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Light {
    pub id: LightId,
    pub zigbee_id: Option<ZigbeeId>,
    pub name: String,
    pub schedule_name: String,
    /// Room or zone through which the light was discovered.
    pub group_name: String,
    pub mirek_range: MirekRange,
    pub auto_on: Option<AutoOnWindow>,
    /// Unclamped target as computed by the schedule engine.
    pub target: Option<LightState>,
    pub reachable: bool,
    /// Observed on-state.
    pub on: bool,
    pub overrides: LightOverrides,
    pub last_update: Option<AppliedSnapshot>,
}

impl Light {
    /// Create a builder for constructing a [`Light`].
    #[must_use]
    pub fn builder() -> LightBuilder {
        LightBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CircadiaError::Validation`] when the id or schedule name is
    /// empty.
    pub fn validate(&self) -> Result<(), CircadiaError> {
        if self.id.as_str().is_empty() || self.schedule_name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    /// Target with colour temperature clamped to the device range.
    #[must_use]
    pub fn target_state(&self) -> Option<LightTarget> {
        self.target.map(|state| LightTarget {
            state: LightState {
                temperature_mirek: self.mirek_range.clamp(state.temperature_mirek),
                ..state
            },
            auto_on: self.auto_on,
            current_on: self.on,
        })
    }

    /// Whether the light needs a push: its clamped target differs from what
    /// was last applied, it is reachable, and no override newer than `cutoff`
    /// exists.
    #[must_use]
    pub fn is_sync_candidate(&self, cutoff: Timestamp) -> bool {
        let Some(target) = self.target_state() else {
            return false;
        };
        if !self.reachable || self.overrides.is_active(cutoff) {
            return false;
        }
        self.last_update
            .is_none_or(|snapshot| snapshot.state != target.state)
    }

    /// Record a successful push of `applied`, the state the device was sent.
    pub fn mark_updated(&mut self, at: Timestamp, applied: LightState) {
        self.last_update = Some(AppliedSnapshot { at, state: applied });
        self.on = applied.on;
        self.reachable = true;
        self.overrides = LightOverrides::default();
    }

    /// Record that the device did not respond.
    pub fn mark_unreachable(&mut self) {
        self.reachable = false;
        self.overrides = LightOverrides::default();
    }
}

/// Step-by-step builder for [`Light`].
#[derive(Debug, Default)]
pub struct LightBuilder {
    id: Option<LightId>,
    zigbee_id: Option<ZigbeeId>,
    name: Option<String>,
    schedule_name: Option<String>,
    group_name: Option<String>,
    mirek_range: MirekRange,
    auto_on: Option<AutoOnWindow>,
    on: bool,
}

impl LightBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<LightId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn zigbee_id(mut self, id: impl Into<ZigbeeId>) -> Self {
        self.zigbee_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn schedule_name(mut self, name: impl Into<String>) -> Self {
        self.schedule_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn group_name(mut self, name: impl Into<String>) -> Self {
        self.group_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn mirek_range(mut self, range: MirekRange) -> Self {
        self.mirek_range = range;
        self
    }

    #[must_use]
    pub fn auto_on(mut self, window: Option<AutoOnWindow>) -> Self {
        self.auto_on = window;
        self
    }

    #[must_use]
    pub fn on(mut self, on: bool) -> Self {
        self.on = on;
        self
    }

    /// Consume the builder, validate, and return a [`Light`].
    ///
    /// A new light is reachable, has no target and no overrides.
    ///
    /// # Errors
    ///
    /// Returns [`CircadiaError::Validation`] if the id or schedule name is
    /// missing.
    pub fn build(self) -> Result<Light, CircadiaError> {
        let light = Light {
            id: self.id.unwrap_or_else(|| LightId::new("")),
            zigbee_id: self.zigbee_id,
            name: self.name.unwrap_or_default(),
            schedule_name: self.schedule_name.unwrap_or_default(),
            group_name: self.group_name.unwrap_or_default(),
            mirek_range: self.mirek_range,
            auto_on: self.auto_on,
            target: None,
            reachable: true,
            on: self.on,
            overrides: LightOverrides::default(),
            last_update: None,
        };
        light.validate()?;
        Ok(light)
    }
}

/// A bridge scene kept in step with a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub name: String,
    pub schedule_name: String,
    pub target: Option<LightState>,
}

impl Scene {
    #[must_use]
    pub fn new(
        id: impl Into<SceneId>,
        name: impl Into<String>,
        schedule_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            schedule_name: schedule_name.into(),
            target: None,
        }
    }
}
