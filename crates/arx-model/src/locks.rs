//! Per-AIP serialization of envelope read-modify-write cycles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// One mutex per AIP id, created on demand and dropped when unused.
#[derive(Debug, Default)]
pub struct AipLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AipLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock of `aip_id`.
    ///
    /// Operations on different AIPs never wait on each other. A panic inside
    /// `f` does not wedge the AIP: the next caller takes the lock over.
    pub fn with_lock<R>(&self, aip_id: &str, f: impl FnOnce() -> R) -> R {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(aip_id.to_string()).or_default())
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Two references left means the map and us: nobody else waits.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(aip_id);
        }
        result
    }

    /// Number of AIPs with a lock currently allocated.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
