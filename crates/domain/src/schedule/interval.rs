//! Resolved intervals and target-state interpolation.

use crate::light::LightState;
use crate::time::Timestamp;

/// Colour temperatures below this are raised to it before conversion.
pub const MIN_TEMPERATURE_KELVIN: f64 = 2000.0;

/// A pattern step pinned to an absolute instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalStep {
    pub time: Timestamp,
    /// Kelvin.
    pub temperature: u32,
    pub brightness: u8,
    pub transition_at: u8,
    pub off: bool,
}

/// The pair of steps enclosing an instant, with the owning schedule's scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub start: IntervalStep,
    pub end: IntervalStep,
    pub rooms: Vec<String>,
    pub zones: Vec<String>,
}

impl Interval {
    /// Fraction of the interval elapsed at `t`, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_at(&self, t: Timestamp) -> f64 {
        let span = micros(self.end.time - self.start.time);
        if span <= 0 {
            return 0.0;
        }
        let elapsed = micros(t - self.start.time);
        (elapsed as f64 / span as f64).clamp(0.0, 1.0)
    }

    /// Interpolate the target state at `t`.
    ///
    /// Values hold at the start step until `transition_at` percent of the
    /// interval has elapsed, then jump to the linear interpolation.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn calculate_target_light_state(&self, t: Timestamp) -> LightState {
        if self.start.off {
            return LightState::OFF;
        }

        let mut progress = self.progress_at(t);
        if progress < f64::from(self.start.transition_at) / 100.0 {
            progress = 0.0;
        }

        let start_k = f64::from(self.start.temperature);
        let end_k = f64::from(self.end.temperature);
        let kelvin = (start_k + progress * (end_k - start_k)).max(MIN_TEMPERATURE_KELVIN);

        let start_b = f64::from(self.start.brightness);
        let end_b = f64::from(self.end.brightness);
        let brightness = (start_b + progress * (end_b - start_b)).floor();

        LightState {
            brightness: brightness.clamp(0.0, 100.0) as u8,
            temperature_mirek: (1_000_000.0 / kelvin).round() as u16,
            on: true,
        }
    }
}

fn micros(delta: chrono::TimeDelta) -> i64 {
    delta
        .num_microseconds()
        .unwrap_or_else(|| delta.num_milliseconds().saturating_mul(1000))
}
