//! The `Caller` façade: service and queue calls over one connection.
//!
//! A caller caches which services and queues the remote domain has
//! confirmed, short-circuits unknown names to a TPENOENT outcome, and runs
//! transactional calls through a [`TransactionWrapper`].
//!
//! # Example
//!
//! ```ignore
//! let caller = Caller::builder()
//!     .address(Address::new("casual.local", 7772))
//!     .connector(connector)
//!     .transaction_manager(manager)
//!     .pending_branches(pending)
//!     .build()
//!     .await?;
//!
//! let reply = caller
//!     .tpcall("TOUPPER", CasualBuffer::octet(&b"hello"[..]), AtmiFlags::NOFLAG)
//!     .await?;
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use casual_core::protocol::MessageSelector;
use casual_core::{
    AtmiFlags, CasualBuffer, CasualError, ProtocolVersion, QueueInfo, QueueMessage, Result,
    ServiceDetails,
};
use tokio::sync::RwLock;
use tracing::instrument;

mod discovery;
mod producer;
mod queue;
mod returns;
mod service;

pub use producer::{CallerProducer, CasualCallerProducer};
pub use queue::QueueCaller;
pub use returns::{
    DequeueReturn, EnqueueReturn, ServiceCallFuture, ServiceReturn, ServiceReturnState,
};
pub use service::ServiceCaller;

use crate::config::{ClientConfig, DomainConfig, DEFAULT_RESOURCE_MANAGER_ID};
use crate::connection::{
    Address, CasualConnection, NetworkConnection, NetworkConnector, NetworkListener,
    NetworkPoolRegistry,
};
use crate::transaction::{
    CasualXaResource, PendingBranchRegistry, TransactionManager, TransactionWrapper, XaResource,
};

/// Records disconnects and forwards them to an optional outer listener.
struct DisconnectAdapter {
    disconnected: AtomicBool,
    listener: Option<Arc<dyn NetworkListener>>,
}

impl NetworkListener for DisconnectAdapter {
    fn disconnected(&self, cause: Option<&CasualError>) {
        self.disconnected.store(true, Ordering::Release);
        if let Some(listener) = &self.listener {
            listener.disconnected(cause);
        }
    }
}

/// Service and queue calls over one connection to a remote domain.
pub struct Caller {
    connection: Arc<CasualConnection>,
    service_caller: ServiceCaller,
    queue_caller: QueueCaller,
    service_cache: RwLock<HashSet<String>>,
    queue_cache: RwLock<HashSet<String>>,
    transaction_wrapper: TransactionWrapper,
    adapter: Arc<DisconnectAdapter>,
}

impl Caller {
    /// Creates a new caller builder.
    pub fn builder() -> CallerBuilder {
        CallerBuilder::new()
    }

    /// Calls `service` and waits for the reply.
    ///
    /// Unknown services yield a TPENOENT return without contacting the
    /// service. With `TPNOTRAN` the call bypasses the caller's transaction.
    ///
    /// # Errors
    ///
    /// Inside a transaction a failed service is returned as
    /// [`CasualError::Transaction`] wrapping [`CasualError::ServiceCallFailed`],
    /// after the transaction was marked rollback-only.
    #[instrument(name = "caller.tpcall", skip(self, data), fields(service = %service))]
    pub async fn tpcall(
        &self,
        service: &str,
        data: CasualBuffer,
        flags: AtmiFlags,
    ) -> Result<ServiceReturn> {
        if !self.service_exists(service).await? {
            return Ok(Self::not_found(service));
        }

        if flags.is_set(AtmiFlags::TPNOTRAN) {
            tracing::debug!("tpcall TPNOTRAN");
            return self.service_caller.tpcall(service, data, flags).await;
        }

        let caller = &self.service_caller;
        self.transaction_wrapper
            .execute(self.xa(), move || async move {
                let reply = caller.tpcall(service, data, flags).await?;
                Self::validate_service(service, reply)
            })
            .await
    }

    /// Calls `service`, returning a future for the reply.
    ///
    /// With `TPNOTRAN` the request is sent and the future resolves when the
    /// reply arrives. Otherwise the call runs to completion inside the
    /// caller's transaction and the returned future is already resolved.
    /// The reply state is not validated on either path.
    #[instrument(name = "caller.tpacall", skip(self, data), fields(service = %service))]
    pub async fn tpacall(
        &self,
        service: &str,
        data: CasualBuffer,
        flags: AtmiFlags,
    ) -> Result<ServiceCallFuture> {
        if !self.service_exists(service).await? {
            return Ok(ServiceCallFuture::ready(Self::not_found(service)));
        }

        if flags.is_set(AtmiFlags::TPNOTRAN) {
            tracing::debug!("tpacall TPNOTRAN");
            return self.service_caller.tpacall(service, data, flags);
        }

        let caller = &self.service_caller;
        let reply = self
            .transaction_wrapper
            .execute(self.xa(), move || async move {
                caller.tpacall(service, data, flags)?.get().await
            })
            .await?;
        Ok(ServiceCallFuture::ready(reply))
    }

    /// Returns true if the remote domain knows `service`.
    ///
    /// A positive answer is cached for the lifetime of this caller.
    pub async fn service_exists(&self, service: &str) -> Result<bool> {
        if self.service_cache.read().await.contains(service) {
            return Ok(true);
        }
        if self.service_caller.service_exists(service).await? {
            self.service_cache.write().await.insert(service.to_string());
            return Ok(true);
        }
        Ok(false)
    }

    /// Returns the details the remote domain reports for `service`.
    pub async fn service_details(&self, service: &str) -> Result<Vec<ServiceDetails>> {
        self.service_caller.service_details(service).await
    }

    /// Stores `message` in the queue.
    ///
    /// Unknown queues yield a TPENOENT return.
    #[instrument(
        name = "caller.enqueue",
        skip(self, queue, message),
        fields(queue = %queue.queue_name())
    )]
    pub async fn enqueue(&self, queue: &QueueInfo, message: QueueMessage) -> Result<EnqueueReturn> {
        if !self.queue_exists(queue).await? {
            tracing::warn!("TPENOENT for queue");
            return Ok(EnqueueReturn::not_found());
        }

        let caller = &self.queue_caller;
        self.transaction_wrapper
            .execute(self.xa(), move || async move {
                let reply = caller.enqueue(queue, message).await?;
                Self::validate_queue("enqueue", queue, reply.error()).map(|()| reply)
            })
            .await
    }

    /// Takes the first message matching `selector` from the queue.
    ///
    /// Unknown queues yield a TPENOENT return.
    #[instrument(
        name = "caller.dequeue",
        skip(self, queue, selector),
        fields(queue = %queue.queue_name())
    )]
    pub async fn dequeue(
        &self,
        queue: &QueueInfo,
        selector: &MessageSelector,
    ) -> Result<DequeueReturn> {
        if !self.queue_exists(queue).await? {
            tracing::warn!("TPENOENT for queue");
            return Ok(DequeueReturn::not_found());
        }

        let caller = &self.queue_caller;
        self.transaction_wrapper
            .execute(self.xa(), move || async move {
                let reply = caller.dequeue(queue, selector).await?;
                Self::validate_queue("dequeue", queue, reply.error()).map(|()| reply)
            })
            .await
    }

    /// Returns true if the remote domain knows the queue.
    ///
    /// A positive answer is cached for the lifetime of this caller.
    pub async fn queue_exists(&self, queue: &QueueInfo) -> Result<bool> {
        let name = queue.queue_name();
        if self.queue_cache.read().await.contains(name) {
            return Ok(true);
        }
        if self.queue_caller.queue_exists(queue).await? {
            self.queue_cache.write().await.insert(name.to_string());
            return Ok(true);
        }
        Ok(false)
    }

    /// Closes the underlying transport.
    pub fn close(&self) {
        self.connection.close();
    }

    /// Returns true once the transport has reported a disconnect.
    pub fn is_disconnected(&self) -> bool {
        self.adapter.disconnected.load(Ordering::Acquire)
    }

    /// Returns the XA resource of this caller's connection.
    pub fn xa_resource(&self) -> &Arc<CasualXaResource> {
        self.connection.xa_resource()
    }

    /// Returns the connection handle.
    pub fn connection(&self) -> &Arc<CasualConnection> {
        &self.connection
    }

    fn xa(&self) -> Arc<dyn XaResource> {
        Arc::clone(self.connection.xa_resource()) as Arc<dyn XaResource>
    }

    fn not_found(service: &str) -> ServiceReturn {
        tracing::warn!(service = %service, "TPENOENT for service");
        ServiceReturn::not_found()
    }

    fn validate_service(service: &str, reply: ServiceReturn) -> Result<ServiceReturn> {
        if reply.is_success() {
            return Ok(reply);
        }
        Err(CasualError::ServiceCallFailed {
            service: service.to_string(),
            error: reply.error(),
        })
    }

    fn validate_queue(
        operation: &'static str,
        queue: &QueueInfo,
        error: casual_core::ErrorState,
    ) -> Result<()> {
        if error.is_ok() {
            return Ok(());
        }
        Err(CasualError::QueueOperationFailed {
            operation,
            queue: queue.queue_name().to_string(),
            error,
        })
    }
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller")
            .field("connection", &self.connection)
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}

enum TransportSource {
    Connector(Arc<dyn NetworkConnector>),
    Pool(Arc<NetworkPoolRegistry>, String),
    Network(Arc<dyn NetworkConnection>),
}

/// Builder for [`Caller`].
#[derive(Default)]
pub struct CallerBuilder {
    address: Option<Address>,
    protocol_version: Option<ProtocolVersion>,
    domain: Option<DomainConfig>,
    resource_manager_id: Option<i32>,
    listener: Option<Arc<dyn NetworkListener>>,
    transaction_manager: Option<Arc<dyn TransactionManager>>,
    pending: Option<Arc<PendingBranchRegistry>>,
    transport: Option<TransportSource>,
}

impl CallerBuilder {
    /// Creates a new caller builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes domain, resource manager id and protocol version from `config`.
    pub fn config(mut self, config: &ClientConfig) -> Self {
        self.domain = Some(config.domain().clone());
        self.resource_manager_id = Some(config.resource_manager_id());
        self.protocol_version = Some(config.protocol_version());
        self
    }

    /// Sets the remote address.
    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Sets the protocol version.
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = Some(version);
        self
    }

    /// Sets the domain identity used in discovery.
    pub fn domain(mut self, domain: DomainConfig) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Sets the resource manager id.
    pub fn resource_manager_id(mut self, id: i32) -> Self {
        self.resource_manager_id = Some(id);
        self
    }

    /// Sets a listener notified when the transport disconnects.
    pub fn network_listener(mut self, listener: Arc<dyn NetworkListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the transaction manager.
    pub fn transaction_manager(mut self, manager: Arc<dyn TransactionManager>) -> Self {
        self.transaction_manager = Some(manager);
        self
    }

    /// Sets the pending-branch registry shared by every caller of the
    /// process. Required.
    pub fn pending_branches(mut self, pending: Arc<PendingBranchRegistry>) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Opens a dedicated transport through `connector`.
    pub fn connector(mut self, connector: Arc<dyn NetworkConnector>) -> Self {
        self.transport = Some(TransportSource::Connector(connector));
        self
    }

    /// Draws the transport from the named pool of `registry`.
    pub fn network_pool(
        mut self,
        registry: Arc<NetworkPoolRegistry>,
        pool_name: impl Into<String>,
    ) -> Self {
        self.transport = Some(TransportSource::Pool(registry, pool_name.into()));
        self
    }

    /// Uses an already established transport.
    pub fn network(mut self, network: Arc<dyn NetworkConnection>) -> Self {
        self.transport = Some(TransportSource::Network(network));
        self
    }

    /// Establishes the transport and builds the caller.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if the transaction manager, the
    /// pending-branch registry, the transport source, or (for connector and
    /// pool sources) the address is missing, and with the transport's error
    /// if connecting fails.
    pub async fn build(self) -> Result<Caller> {
        let transaction_manager = self.transaction_manager.ok_or_else(|| {
            CasualError::Configuration("transaction manager is required".to_string())
        })?;
        let pending = self.pending.ok_or_else(|| {
            CasualError::Configuration("pending branch registry is required".to_string())
        })?;
        let transport = self.transport.ok_or_else(|| {
            CasualError::Configuration("a transport source is required".to_string())
        })?;

        let adapter = Arc::new(DisconnectAdapter {
            disconnected: AtomicBool::new(false),
            listener: self.listener,
        });
        let protocol_version = self.protocol_version.unwrap_or_default();

        let network: Arc<dyn NetworkConnection> = match transport {
            TransportSource::Network(network) => {
                network.add_listener(adapter.clone());
                network
            }
            TransportSource::Connector(connector) => {
                let address = Self::required(self.address.as_ref())?;
                connector
                    .connect(address, protocol_version, adapter.clone())
                    .await?
            }
            TransportSource::Pool(registry, pool_name) => {
                let address = Self::required(self.address.as_ref())?;
                let pooled = registry
                    .get_or_create(&pool_name, address, adapter.clone())
                    .await?;
                pooled as Arc<dyn NetworkConnection>
            }
        };

        let resource_manager_id = self
            .resource_manager_id
            .unwrap_or(DEFAULT_RESOURCE_MANAGER_ID);
        let domain = self.domain.unwrap_or_default();

        let connection = Arc::new(CasualConnection::new(network, resource_manager_id, pending));
        tracing::info!(connection = %connection.id(), "caller created");

        Ok(Caller {
            service_caller: ServiceCaller::new(Arc::clone(&connection), domain.clone()),
            queue_caller: QueueCaller::new(Arc::clone(&connection), domain),
            connection,
            service_cache: RwLock::new(HashSet::new()),
            queue_cache: RwLock::new(HashSet::new()),
            transaction_wrapper: TransactionWrapper::new(transaction_manager),
            adapter,
        })
    }

    fn required(address: Option<&Address>) -> Result<&Address> {
        address.ok_or_else(|| CasualError::Configuration("address is required".to_string()))
    }
}
