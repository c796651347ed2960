//! # circadia-adapter-hue
//!
//! Philips Hue bridge adapter speaking the CLIP v2 API.
//!
//! ## Responsibilities
//! - Discover the lights of each schedule's rooms and zones, and the scenes
//!   named after schedules
//! - Write light and scene states; a multi-status answer on a light write
//!   means the light did not respond
//! - Follow the bridge's server-sent event stream, reconnecting when it drops
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `circadia-app` and `circadia-domain`.

mod client;
mod config;
pub mod discovery;
mod error;
mod gateway;
pub mod resources;
pub mod sse;

pub use config::HueConfig;
pub use error::HueError;
pub use gateway::HueGateway;
