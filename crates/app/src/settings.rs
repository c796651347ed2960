//! Tuning knobs of the reconciliation loop.

use std::time::Duration;

/// Timings used by the orchestrator and its services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// How often targets are recomputed and pushed.
    pub tick_interval: Duration,
    /// Events this soon after a push are treated as echoes of it.
    pub settle_window: chrono::Duration,
    /// Overrides older than this no longer hold a light back.
    pub max_override_age: chrono::Duration,
    /// Minimum spacing between device calls.
    pub throttle_spacing: Duration,
    /// Grace period for in-flight syncs on shutdown.
    pub drain_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            settle_window: chrono::Duration::seconds(2),
            max_override_age: chrono::Duration::minutes(120),
            throttle_spacing: Duration::from_millis(100),
            drain_timeout: Duration::from_secs(5),
        }
    }
}
