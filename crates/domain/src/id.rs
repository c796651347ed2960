//! Typed identifier newtypes for bridge resources.
//!
//! The bridge hands out opaque string ids; wrapping them keeps a light
//! service id from being passed where a zigbee connectivity id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an id received from the bridge.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw id.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// Id of a light service, the primary key of a [`Light`](crate::light::Light).
    LightId
);

define_id!(
    /// Id of the zigbee connectivity service of the device owning a light.
    ZigbeeId
);

define_id!(
    /// Id of a [`Scene`](crate::light::Scene).
    SceneId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_raw_id() {
        let id = LightId::new("3f2a");
        assert_eq!(id.to_string(), "3f2a");
        assert_eq!(id.as_str(), "3f2a");
    }

    #[test]
    fn should_serialize_as_plain_string() {
        let id = SceneId::new("scene-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"scene-1\"");
        let parsed: SceneId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn should_compare_equal_when_built_from_str_or_string() {
        assert_eq!(ZigbeeId::from("z"), ZigbeeId::from("z".to_string()));
    }
}
