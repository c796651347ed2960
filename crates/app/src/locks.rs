//! Per-light mutual exclusion for read-decide-write sequences.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use circadia_domain::id::LightId;

/// One async lock per light, created on first use.
#[derive(Debug, Default)]
pub struct LightLocks {
    locks: Mutex<HashMap<LightId, Arc<tokio::sync::Mutex<()>>>>,
}

impl LightLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other operation holds the light.
    pub async fn lock(&self, id: &LightId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        lock.lock_owned().await
    }
}
