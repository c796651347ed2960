//! Hue adapter error types.

use circadia_domain::error::CircadiaError;

/// Errors specific to talking to the bridge.
#[derive(Debug, thiserror::Error)]
pub enum HueError {
    /// The request could not be sent or its body not read.
    #[error("bridge request failed")]
    Http(#[from] reqwest::Error),

    /// The bridge answered with a non-success status.
    #[error("bridge answered {status} for {path}")]
    Status {
        status: u16,
        path: String,
    },

    /// The bridge answered with a body we could not parse.
    #[error("malformed bridge response")]
    Json(#[from] serde_json::Error),

    /// The application key cannot be sent as a header.
    #[error("application key is not a valid header value")]
    InvalidApplicationKey,

    /// A resource the bridge referenced is absent from its answer.
    #[error("{kind} {id} missing from bridge response")]
    MissingResource { kind: &'static str, id: String },
}

impl HueError {
    /// Status the bridge uses when a device did not acknowledge a write.
    pub const UNREACHABLE_STATUS: u16 = 207;

    /// Convert into a [`CircadiaError::Gateway`] for propagation across port
    /// boundaries.
    #[must_use]
    pub fn into_domain(self) -> CircadiaError {
        CircadiaError::Gateway(Box::new(self))
    }

    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == Self::UNREACHABLE_STATUS)
    }
}

impl From<HueError> for CircadiaError {
    fn from(err: HueError) -> Self {
        err.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_status_error() {
        let err = HueError::Status {
            status: 503,
            path: "/clip/v2/resource/light".to_string(),
        };
        assert_eq!(err.to_string(), "bridge answered 503 for /clip/v2/resource/light");
        assert!(!err.is_unreachable());
    }

    #[test]
    fn should_flag_multi_status_as_unreachable() {
        let err = HueError::Status {
            status: 207,
            path: "/clip/v2/resource/light/abc".to_string(),
        };
        assert!(err.is_unreachable());
    }

    #[test]
    fn should_wrap_into_gateway_error() {
        let err = HueError::MissingResource {
            kind: "scene",
            id: "s1".to_string(),
        };
        assert!(matches!(err.into_domain(), CircadiaError::Gateway(_)));
    }
}
