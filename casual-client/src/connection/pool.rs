//! Reference-counted pools of network transports.
//!
//! A pool serves a single address. It opens up to `size` distinct
//! transports; once full, further requests share a randomly chosen
//! existing transport and bump its reference count.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use casual_core::{CasualError, NetworkMessage, ProtocolVersion, Result};
use rand::Rng;
use tracing::instrument;
use uuid::Uuid;

use super::{Address, NetworkConnection, NetworkConnector, NetworkListener, PendingReply};

/// Notified about pool-level state changes.
pub trait NetworkPoolListener: Send + Sync {
    /// The last transport of `pool` was closed.
    fn pool_emptied(&self, pool: &NetworkConnectionPool);
}

/// A transport shared by several callers.
///
/// Each caller closes it once; the underlying transport is closed and
/// removed from its pool when the last reference goes away.
pub struct ReferenceCountedNetworkConnection {
    inner: Arc<dyn NetworkConnection>,
    references: AtomicUsize,
    pool: Weak<NetworkConnectionPool>,
}

impl ReferenceCountedNetworkConnection {
    fn new(inner: Arc<dyn NetworkConnection>, pool: Weak<NetworkConnectionPool>) -> Self {
        Self {
            inner,
            references: AtomicUsize::new(1),
            pool,
        }
    }

    /// Returns the number of callers sharing the transport.
    pub fn references(&self) -> usize {
        self.references.load(Ordering::Acquire)
    }

    fn retain(&self) -> usize {
        self.references.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drops one reference and returns the remaining count.
    fn release(&self) -> Option<usize> {
        self.references
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()
            .map(|previous| previous - 1)
    }
}

impl NetworkConnection for ReferenceCountedNetworkConnection {
    fn id(&self) -> Uuid {
        self.inner.id()
    }

    fn request(&self, message: NetworkMessage) -> Result<PendingReply> {
        self.inner.request(message)
    }

    fn send(&self, message: NetworkMessage) -> Result<()> {
        self.inner.send(message)
    }

    fn receive(&self, correlation_id: Uuid) -> Result<PendingReply> {
        self.inner.receive(correlation_id)
    }

    fn close(&self) {
        match self.pool.upgrade() {
            Some(pool) => pool.release(self),
            None => {
                if self.release() == Some(0) {
                    self.inner.close();
                }
            }
        }
    }

    fn add_listener(&self, listener: Arc<dyn NetworkListener>) {
        self.inner.add_listener(listener);
    }
}

impl std::fmt::Debug for ReferenceCountedNetworkConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCountedNetworkConnection")
            .field("id", &self.inner.id())
            .field("references", &self.references())
            .finish()
    }
}

/// Marks the owning pool disconnected when one of its transports goes down.
struct PoolConnectionListener {
    pool: Weak<NetworkConnectionPool>,
}

impl NetworkListener for PoolConnectionListener {
    fn disconnected(&self, cause: Option<&CasualError>) {
        if let Some(pool) = self.pool.upgrade() {
            pool.mark_disconnected(cause);
        }
    }
}

/// A bounded pool of transports to one address.
pub struct NetworkConnectionPool {
    name: String,
    address: Address,
    protocol_version: ProtocolVersion,
    size: usize,
    connector: Arc<dyn NetworkConnector>,
    connections: Mutex<Vec<Arc<ReferenceCountedNetworkConnection>>>,
    create_lock: tokio::sync::Mutex<()>,
    disconnected: AtomicBool,
    listener: Option<Weak<dyn NetworkPoolListener>>,
    me: Weak<NetworkConnectionPool>,
}

impl NetworkConnectionPool {
    /// Creates an empty pool for `address`.
    pub fn new(
        name: impl Into<String>,
        address: Address,
        protocol_version: ProtocolVersion,
        size: usize,
        connector: Arc<dyn NetworkConnector>,
    ) -> Arc<Self> {
        Self::with_listener(name, address, protocol_version, size, connector, None)
    }

    pub(crate) fn with_listener(
        name: impl Into<String>,
        address: Address,
        protocol_version: ProtocolVersion,
        size: usize,
        connector: Arc<dyn NetworkConnector>,
        listener: Option<Weak<dyn NetworkPoolListener>>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|me| Self {
            name,
            address,
            protocol_version,
            size: size.max(1),
            connector,
            connections: Mutex::new(Vec::new()),
            create_lock: tokio::sync::Mutex::new(()),
            disconnected: AtomicBool::new(false),
            listener,
            me: me.clone(),
        })
    }

    /// Returns the pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the address the pool serves.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Returns the maximum number of distinct transports.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the number of distinct open transports.
    pub fn connection_count(&self) -> usize {
        self.lock().len()
    }

    /// Returns true once any transport of the pool has disconnected.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    /// Returns a transport to `address`, opening a new one while under capacity.
    ///
    /// `listener` is attached to the returned transport.
    ///
    /// # Errors
    ///
    /// Fails with [`CasualError::AddressMismatch`] for a foreign address and
    /// with a connection error once the pool has been marked disconnected.
    #[instrument(
        name = "network_pool.get_or_create",
        skip(self, listener),
        fields(pool = %self.name, address = %address)
    )]
    pub async fn get_or_create(
        &self,
        address: &Address,
        listener: Arc<dyn NetworkListener>,
    ) -> Result<Arc<ReferenceCountedNetworkConnection>> {
        if *address != self.address {
            return Err(CasualError::AddressMismatch {
                expected: self.address.to_string(),
                actual: address.to_string(),
            });
        }

        let _guard = self.create_lock.lock().await;
        self.ensure_connected()?;

        if let Some(shared) = self.share_existing() {
            shared.add_listener(listener);
            return Ok(shared);
        }

        let pool_listener = Arc::new(PoolConnectionListener {
            pool: self.me.clone(),
        });
        let inner = self
            .connector
            .connect(address, self.protocol_version, pool_listener)
            .await?;
        let pooled = Arc::new(ReferenceCountedNetworkConnection::new(
            inner,
            self.me.clone(),
        ));
        pooled.add_listener(listener);

        let total = {
            let mut connections = self.lock();
            connections.push(Arc::clone(&pooled));
            connections.len()
        };
        tracing::info!(
            connection = %pooled.id(),
            connections = total,
            "opened pooled transport"
        );
        Ok(pooled)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_disconnected() {
            return Err(CasualError::Connection(format!(
                "network pool {} for {} is disconnected",
                self.name, self.address
            )));
        }
        Ok(())
    }

    fn share_existing(&self) -> Option<Arc<ReferenceCountedNetworkConnection>> {
        let connections = self.lock();
        if connections.len() < self.size {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..connections.len());
        let shared = Arc::clone(&connections[index]);
        let references = shared.retain();
        tracing::debug!(connection = %shared.id(), references, "sharing pooled transport");
        Some(shared)
    }

    fn release(&self, connection: &ReferenceCountedNetworkConnection) {
        let emptied = {
            let mut connections = self.lock();
            match connection.release() {
                Some(0) => {
                    connections.retain(|c| !std::ptr::eq(Arc::as_ptr(c), connection));
                    Some(connections.is_empty())
                }
                _ => None,
            }
        };
        let Some(emptied) = emptied else {
            return;
        };

        // Listeners fired by close may call back into the pool.
        connection.inner.close();
        tracing::debug!(
            pool = %self.name,
            connection = %connection.id(),
            "closed pooled transport"
        );

        if emptied {
            if let Some(listener) = self.listener.as_ref().and_then(Weak::upgrade) {
                listener.pool_emptied(self);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<ReferenceCountedNetworkConnection>>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_disconnected(&self, cause: Option<&CasualError>) {
        if !self.disconnected.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                pool = %self.name,
                address = %self.address,
                error = ?cause.map(ToString::to_string),
                "network pool disconnected"
            );
        }
    }
}

impl std::fmt::Debug for NetworkConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConnectionPool")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("size", &self.size)
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}
