//! Day patterns: the declarative shape of a day's lighting.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{CircadiaError, ValidationError};
use crate::time::ClockTime;

/// Whether a pattern follows the sun.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    #[default]
    Fixed,
    /// Sunrise and sunset are computed for the day and clamped to the
    /// pattern's bounds.
    Dynamic,
}

/// When a pattern step takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StepAnchor {
    Clock(ClockTime),
    StartOfDay,
    EndOfDay,
    /// Sunrise shifted by a signed offset.
    Sunrise(Duration),
    Sunset(Duration),
}

impl StepAnchor {
    #[must_use]
    pub fn is_solar(&self) -> bool {
        matches!(self, Self::Sunrise(_) | Self::Sunset(_))
    }
}

fn parse_offset(input: &str, rest: &str) -> Result<Duration, ValidationError> {
    let invalid = || ValidationError::InvalidAnchor(input.to_string());
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(Duration::zero());
    }
    let (negative, magnitude) = if let Some(tail) = rest.strip_prefix('+') {
        (false, tail.trim())
    } else if let Some(tail) = rest.strip_prefix('-') {
        (true, tail.trim())
    } else {
        return Err(invalid());
    };
    let parsed = humantime::parse_duration(magnitude).map_err(|_| invalid())?;
    let offset = Duration::from_std(parsed).map_err(|_| invalid())?;
    Ok(if negative { -offset } else { offset })
}

impl FromStr for StepAnchor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed {
            "startofday" => Ok(Self::StartOfDay),
            "endofday" => Ok(Self::EndOfDay),
            _ => {
                if let Some(rest) = trimmed.strip_prefix("sunrise") {
                    parse_offset(s, rest).map(Self::Sunrise)
                } else if let Some(rest) = trimmed.strip_prefix("sunset") {
                    parse_offset(s, rest).map(Self::Sunset)
                } else {
                    trimmed
                        .parse::<ClockTime>()
                        .map(Self::Clock)
                        .map_err(|_| ValidationError::InvalidAnchor(s.to_string()))
                }
            }
        }
    }
}

impl TryFrom<String> for StepAnchor {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StepAnchor> for String {
    fn from(value: StepAnchor) -> Self {
        value.to_string()
    }
}

fn write_solar(f: &mut fmt::Formatter<'_>, event: &str, offset: Duration) -> fmt::Result {
    if offset.is_zero() {
        return f.write_str(event);
    }
    let sign = if offset < Duration::zero() { '-' } else { '+' };
    match offset.abs().to_std() {
        Ok(magnitude) => write!(f, "{event}{sign}{}", humantime::format_duration(magnitude)),
        Err(_) => f.write_str(event),
    }
}

impl fmt::Display for StepAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clock(t) => t.fmt(f),
            Self::StartOfDay => f.write_str("startofday"),
            Self::EndOfDay => f.write_str("endofday"),
            Self::Sunrise(offset) => write_solar(f, "sunrise", *offset),
            Self::Sunset(offset) => write_solar(f, "sunset", *offset),
        }
    }
}

/// Temperature and brightness used for the synthetic day boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultStep {
    /// Kelvin.
    pub temperature: u32,
    pub brightness: u8,
}

/// One point of a day pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStep {
    pub time: StepAnchor,
    /// Kelvin.
    pub temperature: u32,
    pub brightness: u8,
    /// Percent of the interval during which the start values are held.
    #[serde(default)]
    pub transition_at: u8,
    #[serde(default)]
    pub off: bool,
}

impl PatternStep {
    fn boundary(anchor: StepAnchor, default: DefaultStep) -> Self {
        Self {
            time: anchor,
            temperature: default.temperature,
            brightness: default.brightness,
            transition_at: 0,
            off: false,
        }
    }
}

/// The declarative description of a day's lighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPattern {
    #[serde(rename = "type", default)]
    pub kind: PatternKind,
    #[serde(default)]
    pub sunrise_min: Option<ClockTime>,
    #[serde(default)]
    pub sunrise_max: Option<ClockTime>,
    #[serde(default)]
    pub sunset_min: Option<ClockTime>,
    #[serde(default)]
    pub sunset_max: Option<ClockTime>,
    pub default: DefaultStep,
    #[serde(default)]
    pub pattern: Vec<PatternStep>,
}

impl DayPattern {
    #[must_use]
    pub fn uses_solar_anchors(&self) -> bool {
        self.kind == PatternKind::Dynamic || self.pattern.iter().any(|step| step.time.is_solar())
    }

    /// The step list bracketed by `startofday` and `endofday` steps carrying
    /// the default values.
    #[must_use]
    pub fn normalised_steps(&self) -> Vec<PatternStep> {
        let mut steps = Vec::with_capacity(self.pattern.len() + 2);
        if self.pattern.first().map(|s| s.time) != Some(StepAnchor::StartOfDay) {
            steps.push(PatternStep::boundary(StepAnchor::StartOfDay, self.default));
        }
        steps.extend_from_slice(&self.pattern);
        if self.pattern.last().map(|s| s.time) != Some(StepAnchor::EndOfDay) {
            steps.push(PatternStep::boundary(StepAnchor::EndOfDay, self.default));
        }
        steps
    }

    /// Check value ranges and solar bounds. `name` is used in errors.
    ///
    /// # Errors
    ///
    /// Returns [`CircadiaError::Validation`] on the first violation.
    pub fn validate(&self, name: &str) -> Result<(), CircadiaError> {
        if self.default.temperature == 0 {
            return Err(ValidationError::ZeroTemperature.into());
        }
        check_percent("brightness", self.default.brightness)?;
        for step in &self.pattern {
            if step.temperature == 0 {
                return Err(ValidationError::ZeroTemperature.into());
            }
            check_percent("brightness", step.brightness)?;
            check_percent("transition_at", step.transition_at)?;
        }
        if self.kind == PatternKind::Dynamic {
            let (Some(rise_min), Some(rise_max), Some(set_min), Some(set_max)) = (
                self.sunrise_min,
                self.sunrise_max,
                self.sunset_min,
                self.sunset_max,
            ) else {
                return Err(ValidationError::MissingSolarBounds(name.to_string()).into());
            };
            if rise_min > rise_max {
                return Err(ValidationError::InvertedBounds {
                    pattern: name.to_string(),
                    field: "sunrise",
                }
                .into());
            }
            if set_min > set_max {
                return Err(ValidationError::InvertedBounds {
                    pattern: name.to_string(),
                    field: "sunset",
                }
                .into());
            }
        }
        Ok(())
    }
}

fn check_percent(field: &'static str, value: u8) -> Result<(), ValidationError> {
    if value > 100 {
        return Err(ValidationError::OutOfRange {
            field,
            value: u32::from(value),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_every_anchor_kind() {
        assert_eq!(
            "07:30".parse::<StepAnchor>().unwrap(),
            StepAnchor::Clock(ClockTime::from_hm(7, 30).unwrap())
        );
        assert_eq!(
            "startofday".parse::<StepAnchor>().unwrap(),
            StepAnchor::StartOfDay
        );
        assert_eq!(
            "endofday".parse::<StepAnchor>().unwrap(),
            StepAnchor::EndOfDay
        );
        assert_eq!(
            "sunrise".parse::<StepAnchor>().unwrap(),
            StepAnchor::Sunrise(Duration::zero())
        );
        assert_eq!(
            "sunset-1h".parse::<StepAnchor>().unwrap(),
            StepAnchor::Sunset(Duration::hours(-1))
        );
        assert_eq!(
            "sunrise + 1h 30m".parse::<StepAnchor>().unwrap(),
            StepAnchor::Sunrise(Duration::minutes(90))
        );
    }

    #[test]
    fn should_reject_unknown_anchor() {
        assert!("noon".parse::<StepAnchor>().is_err());
        assert!("sunrise*2h".parse::<StepAnchor>().is_err());
        assert!("sunset+soon".parse::<StepAnchor>().is_err());
    }

    #[test]
    fn should_display_anchor_in_config_syntax() {
        assert_eq!(StepAnchor::Sunset(Duration::hours(-1)).to_string(), "sunset-1h");
        assert_eq!(StepAnchor::Sunrise(Duration::zero()).to_string(), "sunrise");
        assert_eq!(StepAnchor::StartOfDay.to_string(), "startofday");
    }

    #[test]
    fn should_deserialize_pattern_from_json() {
        let json = r#"{
            "type": "dynamic",
            "sunrise_min": "06:00",
            "sunrise_max": "08:00",
            "sunset_min": "18:00",
            "sunset_max": "21:00",
            "default": { "temperature": 2000, "brightness": 10 },
            "pattern": [
                { "time": "sunrise", "temperature": 4000, "brightness": 80, "transition_at": 50 },
                { "time": "sunset-30m", "temperature": 2700, "brightness": 60 },
                { "time": "23:00", "temperature": 2000, "brightness": 0, "off": true }
            ]
        }"#;
        let pattern: DayPattern = serde_json::from_str(json).unwrap();
        assert_eq!(pattern.kind, PatternKind::Dynamic);
        assert_eq!(pattern.pattern.len(), 3);
        assert_eq!(pattern.pattern[0].transition_at, 50);
        assert!(pattern.pattern[2].off);
        assert!(pattern.validate("evening").is_ok());
    }

    #[test]
    fn should_bracket_steps_with_day_boundaries() {
        let pattern = DayPattern {
            kind: PatternKind::Fixed,
            sunrise_min: None,
            sunrise_max: None,
            sunset_min: None,
            sunset_max: None,
            default: DefaultStep {
                temperature: 2200,
                brightness: 20,
            },
            pattern: vec![PatternStep {
                time: StepAnchor::Clock(ClockTime::from_hm(12, 0).unwrap()),
                temperature: 5000,
                brightness: 100,
                transition_at: 0,
                off: false,
            }],
        };
        let steps = pattern.normalised_steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].time, StepAnchor::StartOfDay);
        assert_eq!(steps[0].temperature, 2200);
        assert_eq!(steps[2].time, StepAnchor::EndOfDay);
        assert_eq!(steps[2].brightness, 20);
    }

    #[test]
    fn should_require_bounds_for_dynamic_pattern() {
        let pattern = DayPattern {
            kind: PatternKind::Dynamic,
            sunrise_min: None,
            sunrise_max: None,
            sunset_min: None,
            sunset_max: None,
            default: DefaultStep {
                temperature: 2200,
                brightness: 20,
            },
            pattern: Vec::new(),
        };
        assert!(matches!(
            pattern.validate("sun"),
            Err(CircadiaError::Validation(
                ValidationError::MissingSolarBounds(_)
            ))
        ));
    }

    #[test]
    fn should_reject_brightness_above_hundred() {
        let pattern = DayPattern {
            kind: PatternKind::Fixed,
            sunrise_min: None,
            sunrise_max: None,
            sunset_min: None,
            sunset_max: None,
            default: DefaultStep {
                temperature: 2200,
                brightness: 120,
            },
            pattern: Vec::new(),
        };
        assert!(pattern.validate("bright").is_err());
    }
}
