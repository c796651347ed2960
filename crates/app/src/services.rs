//! Application services.
//!
//! Each service takes its port implementations through generic parameters
//! (constructor injection), so this layer never knows about concrete
//! adapters.

pub mod logical_state;
pub mod physical_sync;
