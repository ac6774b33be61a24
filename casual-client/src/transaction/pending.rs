//! Process-wide bookkeeping of in-flight transaction branches.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use casual_core::Xid;

/// The set of branches that have been started and not yet ended.
///
/// Shared by every XA resource of a process; construct one and hand it to
/// each connection.
#[derive(Debug, Default)]
pub struct PendingBranchRegistry {
    branches: Mutex<HashSet<Xid>>,
}

impl PendingBranchRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `xid`, returning false if it was already pending.
    pub fn try_register(&self, xid: &Xid) -> bool {
        self.lock().insert(xid.clone())
    }

    /// Removes `xid`, returning true if it was pending.
    pub fn remove(&self, xid: &Xid) -> bool {
        self.lock().remove(xid)
    }

    /// Returns true if `xid` is pending.
    pub fn is_pending(&self, xid: &Xid) -> bool {
        self.lock().contains(xid)
    }

    /// Returns the number of pending branches.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no branch is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Xid>> {
        self.branches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
