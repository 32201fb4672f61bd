//! Per-service single-flight tokens.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Set of services currently being evaluated.
#[derive(Debug, Clone, Default)]
pub struct InflightSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl InflightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `service_id`. Returns `None` if it is already in flight.
    /// The claim is released when the guard drops, including on panic.
    pub fn try_acquire(&self, service_id: &str) -> Option<InflightGuard> {
        let mut set = lock(&self.inner);
        if !set.insert(service_id.to_string()) {
            return None;
        }
        Some(InflightGuard {
            set: self.inner.clone(),
            service_id: service_id.to_string(),
        })
    }

    pub fn contains(&self, service_id: &str) -> bool {
        lock(&self.inner).contains(service_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held while a service is being evaluated.
#[derive(Debug)]
pub struct InflightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    service_id: String,
}

impl InflightGuard {
    pub fn service_id(&self) -> &str {
        &self.service_id
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.service_id);
    }
}

// The set stays consistent even if a holder panicked mid-update.
fn lock(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
