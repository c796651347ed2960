//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`CircadiaError`] via `#[from]` or an explicit `From` impl.

/// Top-level error shared by the application core and its adapters.
#[derive(Debug, thiserror::Error)]
pub enum CircadiaError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("schedule error")]
    Schedule(#[from] ScheduleError),

    /// The device did not acknowledge the command. Kept apart from
    /// transport failures so callers can record reachability.
    #[error("device {0} is unreachable")]
    Unreachable(String),

    #[error("storage error")]
    Storage(Box<dyn std::error::Error + Send + Sync>),

    #[error("gateway error")]
    Gateway(Box<dyn std::error::Error + Send + Sync>),
}

/// Invariant violations in configuration-derived domain objects.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("duplicate schedule name {0:?}")]
    DuplicateSchedule(String),

    #[error("schedule {schedule:?} references unknown day pattern {pattern:?}")]
    UnknownDayPattern { schedule: String, pattern: String },

    #[error("{field} must be between 0 and 100, got {value}")]
    OutOfRange { field: &'static str, value: u32 },

    #[error("colour temperature must be positive")]
    ZeroTemperature,

    #[error("invalid clock time {0:?}, expected HH:MM")]
    InvalidClockTime(String),

    #[error("invalid step anchor {0:?}")]
    InvalidAnchor(String),

    #[error("dynamic day pattern {0:?} requires sunrise and sunset bounds")]
    MissingSolarBounds(String),

    #[error("day pattern {pattern:?} has {field} minimum after maximum")]
    InvertedBounds {
        pattern: String,
        field: &'static str,
    },

    #[error("invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// A looked-up record does not exist.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Failures while resolving a day pattern for a given instant.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("no interval of day pattern {0:?} contains the requested time")]
    NoMatchingInterval(String),

    #[error("day pattern {0:?} uses solar anchors but no location is configured")]
    MissingLocation(String),

    #[error("local time {0} does not exist in the configured timezone")]
    InvalidLocalTime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_into_circadia_error() {
        let err: CircadiaError = ValidationError::EmptyName.into();
        assert!(matches!(
            err,
            CircadiaError::Validation(ValidationError::EmptyName)
        ));
    }

    #[test]
    fn should_compare_invalid_coordinates_by_value() {
        let err = ValidationError::InvalidCoordinates {
            latitude: 91.5,
            longitude: 0.0,
        };
        assert_eq!(
            err,
            ValidationError::InvalidCoordinates {
                latitude: 91.5,
                longitude: 0.0,
            }
        );
        assert_ne!(err, ValidationError::EmptyName);
        assert_eq!(err.to_string(), "invalid coordinates (91.5, 0)");
    }

    #[test]
    fn should_format_not_found_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Light",
            id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Light abc not found");
    }

    #[test]
    fn should_name_device_when_unreachable() {
        let err = CircadiaError::Unreachable("light-1".to_string());
        assert_eq!(err.to_string(), "device light-1 is unreachable");
    }
}
