//! Schedules: which lights follow which day pattern.
//!
//! A [`Schedule`] binds rooms and zones to a named [`DayPattern`]. The
//! [`ScheduleEngine`] turns a pattern and an instant into an [`Interval`],
//! and the interval into a target [`LightState`](crate::light::LightState).

mod day_pattern;
mod engine;
mod interval;

use std::collections::{HashMap, HashSet};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

pub use day_pattern::{DayPattern, DefaultStep, PatternKind, PatternStep, StepAnchor};
pub use engine::{ScheduleEngine, SolarTimes};
pub use interval::{Interval, IntervalStep};

use crate::error::{CircadiaError, NotFoundError, ValidationError};
use crate::time::ClockTime;

/// Daily window during which a schedule may switch lights on by itself.
///
/// The window is half-open, `[from, to)`. When `from` is after `to` it wraps
/// past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoOnWindow {
    pub from: ClockTime,
    pub to: ClockTime,
}

impl AutoOnWindow {
    #[must_use]
    pub fn contains(&self, t: NaiveTime) -> bool {
        let from = self.from.as_naive();
        let to = self.to.as_naive();
        if from <= to {
            from <= t && t < to
        } else {
            t >= from || t < to
        }
    }
}

/// A named set of rooms and zones driven by one day pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub name: String,
    #[serde(default)]
    pub rooms: Vec<String>,
    #[serde(default)]
    pub zones: Vec<String>,
    pub day_pattern: String,
    #[serde(default)]
    pub auto_on: Option<AutoOnWindow>,
    #[serde(default)]
    pub disabled: bool,
}

/// Geographic position used for sunrise and sunset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCoordinates`] outside the valid
    /// latitude and longitude ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude)
        {
            return Err(ValidationError::InvalidCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
            });
        }
        Ok(())
    }
}

/// All configured schedules together with the day patterns they reference.
#[derive(Debug, Clone, Default)]
pub struct ScheduleCatalog {
    schedules: Vec<Schedule>,
    day_patterns: HashMap<String, DayPattern>,
}

impl ScheduleCatalog {
    /// Build and validate a catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CircadiaError::Validation`] for empty or duplicate schedule
    /// names, dangling day pattern references and invalid patterns.
    pub fn new(
        schedules: Vec<Schedule>,
        day_patterns: HashMap<String, DayPattern>,
    ) -> Result<Self, CircadiaError> {
        let catalog = Self {
            schedules,
            day_patterns,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// # Errors
    ///
    /// See [`ScheduleCatalog::new`].
    pub fn validate(&self) -> Result<(), CircadiaError> {
        let mut seen = HashSet::new();
        for schedule in &self.schedules {
            if schedule.name.is_empty() {
                return Err(ValidationError::EmptyName.into());
            }
            if !seen.insert(schedule.name.as_str()) {
                return Err(ValidationError::DuplicateSchedule(schedule.name.clone()).into());
            }
            if !self.day_patterns.contains_key(&schedule.day_pattern) {
                return Err(ValidationError::UnknownDayPattern {
                    schedule: schedule.name.clone(),
                    pattern: schedule.day_pattern.clone(),
                }
                .into());
            }
        }
        for (name, pattern) in &self.day_patterns {
            pattern.validate(name)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    #[must_use]
    pub fn day_pattern(&self, name: &str) -> Option<&DayPattern> {
        self.day_patterns.get(name)
    }

    /// Enabled schedules paired with their day pattern.
    pub fn enabled(&self) -> impl Iterator<Item = (&Schedule, &DayPattern)> {
        self.schedules
            .iter()
            .filter(|schedule| !schedule.disabled)
            .filter_map(|schedule| {
                self.day_patterns
                    .get(&schedule.day_pattern)
                    .map(|pattern| (schedule, pattern))
            })
    }

    /// Owned copies of the enabled schedules, as handed to discovery.
    #[must_use]
    pub fn enabled_schedules(&self) -> Vec<Schedule> {
        self.enabled().map(|(schedule, _)| schedule.clone()).collect()
    }

    /// Whether any schedule relies on sunrise or sunset.
    #[must_use]
    pub fn needs_location(&self) -> bool {
        self.schedules.iter().any(|schedule| {
            self.day_patterns
                .get(&schedule.day_pattern)
                .is_some_and(DayPattern::uses_solar_anchors)
        })
    }

    /// Enable or disable a schedule by name.
    ///
    /// # Errors
    ///
    /// Returns [`CircadiaError::NotFound`] when no schedule has that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), CircadiaError> {
        let schedule = self
            .schedules
            .iter_mut()
            .find(|schedule| schedule.name == name)
            .ok_or_else(|| NotFoundError {
                entity: "Schedule",
                id: name.to_string(),
            })?;
        schedule.disabled = !enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    fn fixed_pattern() -> DayPattern {
        DayPattern {
            kind: PatternKind::Fixed,
            sunrise_min: None,
            sunrise_max: None,
            sunset_min: None,
            sunset_max: None,
            default: DefaultStep {
                temperature: 2700,
                brightness: 50,
            },
            pattern: Vec::new(),
        }
    }

    fn schedule(name: &str) -> Schedule {
        Schedule {
            name: name.to_string(),
            rooms: vec!["Office".to_string()],
            zones: Vec::new(),
            day_pattern: "flat".to_string(),
            auto_on: None,
            disabled: false,
        }
    }

    fn patterns() -> HashMap<String, DayPattern> {
        HashMap::from([("flat".to_string(), fixed_pattern())])
    }

    #[test]
    fn should_contain_time_inside_daytime_window() {
        let window = AutoOnWindow {
            from: clock("06:00"),
            to: clock("09:00"),
        };
        assert!(window.contains(clock("06:00").as_naive()));
        assert!(window.contains(clock("08:59").as_naive()));
        assert!(!window.contains(clock("09:00").as_naive()));
        assert!(!window.contains(clock("05:59").as_naive()));
    }

    #[test]
    fn should_wrap_window_past_midnight() {
        let window = AutoOnWindow {
            from: clock("22:00"),
            to: clock("02:00"),
        };
        assert!(window.contains(clock("23:30").as_naive()));
        assert!(window.contains(clock("01:00").as_naive()));
        assert!(!window.contains(clock("02:00").as_naive()));
        assert!(!window.contains(clock("12:00").as_naive()));
    }

    #[test]
    fn should_reject_duplicate_schedule_names() {
        let result = ScheduleCatalog::new(vec![schedule("a"), schedule("a")], patterns());
        assert!(matches!(
            result,
            Err(CircadiaError::Validation(ValidationError::DuplicateSchedule(_)))
        ));
    }

    #[test]
    fn should_reject_unknown_day_pattern() {
        let mut bad = schedule("a");
        bad.day_pattern = "missing".to_string();
        let result = ScheduleCatalog::new(vec![bad], patterns());
        assert!(matches!(
            result,
            Err(CircadiaError::Validation(
                ValidationError::UnknownDayPattern { .. }
            ))
        ));
    }

    #[test]
    fn should_skip_disabled_schedules() {
        let mut catalog =
            ScheduleCatalog::new(vec![schedule("a"), schedule("b")], patterns()).unwrap();
        catalog.set_enabled("a", false).unwrap();
        let names: Vec<&str> = catalog.enabled().map(|(s, _)| s.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);

        catalog.set_enabled("a", true).unwrap();
        assert_eq!(catalog.enabled_schedules().len(), 2);
    }

    #[test]
    fn should_return_not_found_when_toggling_unknown_schedule() {
        let mut catalog = ScheduleCatalog::new(vec![schedule("a")], patterns()).unwrap();
        assert!(matches!(
            catalog.set_enabled("zzz", true),
            Err(CircadiaError::NotFound(_))
        ));
    }

    #[test]
    fn should_reject_out_of_range_coordinates() {
        let location = GeoLocation {
            latitude: 91.0,
            longitude: 0.0,
        };
        assert!(location.validate().is_err());
        let location = GeoLocation {
            latitude: 51.5,
            longitude: -0.1,
        };
        assert!(location.validate().is_ok());
    }
}
