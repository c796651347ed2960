//! Hue bridge connection settings.

use serde::Deserialize;

/// Configuration of the bridge connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HueConfig {
    /// Host name or IP address of the bridge.
    pub address: String,
    /// Key sent in the `hue-application-key` header.
    pub application_key: String,
    /// Timeout of every regular request, in seconds.
    pub request_timeout_secs: u64,
    /// Pause before reconnecting a dropped event stream, in seconds.
    pub reconnect_delay_secs: u64,
    /// Scenes named `<prefix><schedule name>` follow that schedule.
    pub scene_prefix: String,
}

impl Default for HueConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            application_key: String::new(),
            request_timeout_secs: 10,
            reconnect_delay_secs: 5,
            scene_prefix: "Circadia_".to_string(),
        }
    }
}
