//! Per-virtual-path mutual exclusion.
//!
//! Appending a version is load-modify-save on one document. Holding the
//! path's lock for the whole sequence keeps concurrent writers to the same
//! path from silently discarding each other's version within this process.
//! Locks for different paths never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use stow_types::VirtualPath;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Guard returned by [`PathLocks::lock`]; the path is unlocked on drop.
pub type PathGuard = OwnedMutexGuard<()>;

/// Keyed async locks, one per normalized virtual path.
///
/// Entries are held weakly and pruned once no guard or waiter references
/// them, so the table only grows with the number of paths in flight.
#[derive(Debug, Default)]
pub struct PathLocks {
    table: Mutex<HashMap<VirtualPath, Weak<AsyncMutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path`.
    pub async fn lock(&self, path: &VirtualPath) -> PathGuard {
        self.entry(path).lock_owned().await
    }

    fn entry(&self, path: &VirtualPath) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = table.get(path).and_then(Weak::upgrade) {
            return existing;
        }
        table.retain(|_, weak| weak.strong_count() > 0);
        let fresh = Arc::new(AsyncMutex::new(()));
        table.insert(path.clone(), Arc::downgrade(&fresh));
        fresh
    }

    /// Number of paths currently tracked (including not-yet-pruned entries).
    pub fn tracked(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
