//! # circadia-domain
//!
//! Pure domain model for the circadia lighting daemon.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Lights** and **Scenes** with their target, last-applied and
//!   override state
//! - Define **Schedules** and **Day patterns** (the declarative day shape)
//! - Resolve patterns into **Intervals** and interpolate target states
//!   (the schedule engine)
//! - Model inbound **bridge events**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod event;
pub mod light;
pub mod schedule;
