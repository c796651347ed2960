//! Schedule engine: resolves a day pattern to the interval enclosing an
//! instant.

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use sunrise::{Coordinates, SolarDay, SolarEvent};

use super::day_pattern::{DayPattern, PatternKind, PatternStep, StepAnchor};
use super::interval::{Interval, IntervalStep};
use super::{GeoLocation, Schedule};
use crate::error::ScheduleError;
use crate::time::{ClockTime, Timestamp, local_date, local_to_utc};

/// Sunrise and sunset of one day, after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolarTimes {
    pub sunrise: Timestamp,
    pub sunset: Timestamp,
}

/// Pure resolver for day patterns in a fixed timezone and location.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleEngine {
    tz: Tz,
    location: Option<GeoLocation>,
}

impl ScheduleEngine {
    #[must_use]
    pub fn new(tz: Tz, location: Option<GeoLocation>) -> Self {
        Self { tz, location }
    }

    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Sunrise and sunset for `date`, clamped to the pattern's bounds when
    /// the pattern is dynamic.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::MissingLocation`] without a usable location.
    pub fn solar_times(
        &self,
        pattern_name: &str,
        pattern: &DayPattern,
        date: NaiveDate,
    ) -> Result<SolarTimes, ScheduleError> {
        let coord = self
            .location
            .and_then(|location| Coordinates::new(location.latitude, location.longitude))
            .ok_or_else(|| ScheduleError::MissingLocation(pattern_name.to_string()))?;
        let day = SolarDay::new(coord, date);
        let mut sunrise = day.event_time(SolarEvent::Sunrise);
        let mut sunset = day.event_time(SolarEvent::Sunset);

        if pattern.kind == PatternKind::Dynamic {
            sunrise = self.clamp(sunrise, date, pattern.sunrise_min, pattern.sunrise_max)?;
            sunset = self.clamp(sunset, date, pattern.sunset_min, pattern.sunset_max)?;
        }
        Ok(SolarTimes { sunrise, sunset })
    }

    fn clamp(
        &self,
        value: Timestamp,
        date: NaiveDate,
        min: Option<ClockTime>,
        max: Option<ClockTime>,
    ) -> Result<Timestamp, ScheduleError> {
        let mut value = value;
        if let Some(min) = min {
            let min = local_to_utc(self.tz, date.and_time(min.as_naive()))?;
            value = value.max(min);
        }
        if let Some(max) = max {
            let max = local_to_utc(self.tz, date.and_time(max.as_naive()))?;
            value = value.min(max);
        }
        Ok(value)
    }

    fn resolve_anchor(
        &self,
        pattern_name: &str,
        anchor: StepAnchor,
        date: NaiveDate,
        solar: Option<SolarTimes>,
    ) -> Result<Timestamp, ScheduleError> {
        let missing = || ScheduleError::MissingLocation(pattern_name.to_string());
        match anchor {
            StepAnchor::Clock(clock) => local_to_utc(self.tz, date.and_time(clock.as_naive())),
            StepAnchor::StartOfDay => local_to_utc(self.tz, date.and_time(NaiveTime::MIN)),
            StepAnchor::EndOfDay => {
                let end = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
                    .ok_or_else(|| ScheduleError::InvalidLocalTime("23:59:59.999999".into()))?;
                local_to_utc(self.tz, date.and_time(end))
            }
            StepAnchor::Sunrise(offset) => solar.map(|s| s.sunrise + offset).ok_or_else(missing),
            StepAnchor::Sunset(offset) => solar.map(|s| s.sunset + offset).ok_or_else(missing),
        }
    }

    fn resolve_step(
        &self,
        pattern_name: &str,
        step: &PatternStep,
        date: NaiveDate,
        solar: Option<SolarTimes>,
    ) -> Result<IntervalStep, ScheduleError> {
        Ok(IntervalStep {
            time: self.resolve_anchor(pattern_name, step.time, date, solar)?,
            temperature: step.temperature,
            brightness: step.brightness,
            transition_at: step.transition_at,
            off: step.off,
        })
    }

    /// Find the interval of `pattern` that contains `t` on `t`'s local day.
    ///
    /// The last interval also accepts instants at or after its end, so the
    /// final microsecond of the day still resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NoMatchingInterval`] when no pair of steps
    /// encloses `t`, and [`ScheduleError::MissingLocation`] when a
    /// solar anchor cannot be computed.
    pub fn resolve_interval(
        &self,
        schedule: &Schedule,
        pattern: &DayPattern,
        t: Timestamp,
    ) -> Result<Interval, ScheduleError> {
        let pattern_name = schedule.day_pattern.as_str();
        let date = local_date(self.tz, t);
        let solar = if pattern.uses_solar_anchors() {
            Some(self.solar_times(pattern_name, pattern, date)?)
        } else {
            None
        };

        let steps = pattern
            .normalised_steps()
            .iter()
            .map(|step| self.resolve_step(pattern_name, step, date, solar))
            .collect::<Result<Vec<_>, _>>()?;

        let last_pair = steps.len().saturating_sub(2);
        for (index, pair) in steps.windows(2).enumerate() {
            let (start, end) = (pair[0], pair[1]);
            let inside = start.time <= t && (t < end.time || index == last_pair);
            if inside {
                return Ok(Interval {
                    start,
                    end,
                    rooms: schedule.rooms.clone(),
                    zones: schedule.zones.clone(),
                });
            }
        }
        Err(ScheduleError::NoMatchingInterval(pattern_name.to_string()))
    }
}
