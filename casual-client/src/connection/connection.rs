//! The connection handle pairing a transport with its XA resource.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use casual_core::Xid;
use uuid::Uuid;

use super::NetworkConnection;
use crate::transaction::{CasualXaResource, PendingBranchRegistry};

/// Transaction timeout shared between a connection handle and its XA resource.
///
/// Stored in whole seconds; defaults to zero.
#[derive(Debug, Default)]
pub struct TransactionTimeout(AtomicU64);

impl TransactionTimeout {
    /// Creates a timeout of zero seconds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current timeout.
    pub fn get(&self) -> Duration {
        Duration::from_secs(self.0.load(Ordering::Acquire))
    }

    /// Replaces the timeout, truncated to whole seconds.
    pub fn set(&self, timeout: Duration) {
        self.0.store(timeout.as_secs(), Ordering::Release);
    }
}

/// A transport together with the XA resource bridging transactions over it.
///
/// The identity of a handle is the identity of its transport.
pub struct CasualConnection {
    network: Arc<dyn NetworkConnection>,
    timeout: Arc<TransactionTimeout>,
    xa_resource: Arc<CasualXaResource>,
}

impl CasualConnection {
    /// Creates a handle over `network`.
    pub fn new(
        network: Arc<dyn NetworkConnection>,
        resource_manager_id: i32,
        pending: Arc<PendingBranchRegistry>,
    ) -> Self {
        let timeout = Arc::new(TransactionTimeout::new());
        let xa_resource = Arc::new(CasualXaResource::new(
            Arc::clone(&network),
            resource_manager_id,
            Arc::clone(&timeout),
            pending,
        ));
        Self {
            network,
            timeout,
            xa_resource,
        }
    }

    /// Returns the transport identity.
    pub fn id(&self) -> Uuid {
        self.network.id()
    }

    /// Returns the transport.
    pub fn network(&self) -> &Arc<dyn NetworkConnection> {
        &self.network
    }

    /// Returns the XA resource bound to this handle.
    pub fn xa_resource(&self) -> &Arc<CasualXaResource> {
        &self.xa_resource
    }

    /// Returns the branch currently associated with the XA resource, or the null xid.
    pub fn current_xid(&self) -> Xid {
        self.xa_resource.current_xid()
    }

    /// Returns the transaction timeout sent with service calls.
    pub fn transaction_timeout(&self) -> Duration {
        self.timeout.get()
    }

    /// Sets the transaction timeout.
    pub fn set_transaction_timeout(&self, timeout: Duration) {
        self.timeout.set(timeout);
    }

    /// Closes the transport.
    pub fn close(&self) {
        self.network.close();
    }
}

impl std::fmt::Debug for CasualConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasualConnection")
            .field("id", &self.id())
            .field("timeout", &self.timeout.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_defaults_to_zero() {
        assert_eq!(TransactionTimeout::new().get(), Duration::ZERO);
    }

    #[test]
    fn test_timeout_truncates_to_seconds() {
        let timeout = TransactionTimeout::new();
        timeout.set(Duration::from_millis(2500));
        assert_eq!(timeout.get(), Duration::from_secs(2));
    }
}
