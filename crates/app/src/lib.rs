//! # circadia-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define the driven ports adapters must implement:
//!   - `LightStore`: persisted lights, scenes, targets and overrides
//!   - `DeviceGateway`: discovery, device writes and the event stream
//! - Provide the services driving them:
//!   - `LogicalStateManager`: schedule targets and event classification
//!   - `PhysicalSync`: throttled pushes of targets to devices
//! - Provide the `Orchestrator` running the reconciliation loop
//!
//! ## Dependency rule
//! Depends on `circadia-domain` only (plus `tokio` for timers and locks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod locks;
pub mod orchestrator;
pub mod ports;
pub mod services;
pub mod settings;
pub mod throttle;

#[cfg(test)]
mod test_support;
