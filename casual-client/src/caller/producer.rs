//! Factories creating callers for an address.

use std::sync::Arc;

use async_trait::async_trait;
use casual_core::Result;

use super::Caller;
use crate::config::ClientConfig;
use crate::connection::{Address, NetworkConnector, NetworkListener, NetworkPoolRegistry};
use crate::transaction::{PendingBranchRegistry, TransactionManager};

/// Creates a connected [`Caller`] for an address.
///
/// Managed connections use a producer both for the first connect and for
/// every reconnect attempt.
#[async_trait]
pub trait CallerProducer: Send + Sync {
    /// Connects to `address`; `listener` is told when the transport drops.
    async fn create_caller(
        &self,
        address: &Address,
        listener: Arc<dyn NetworkListener>,
    ) -> Result<Arc<Caller>>;
}

/// The default producer, building callers from a client configuration.
pub struct CasualCallerProducer {
    config: ClientConfig,
    connector: Arc<dyn NetworkConnector>,
    transaction_manager: Arc<dyn TransactionManager>,
    pending: Arc<PendingBranchRegistry>,
    network_pool: Option<(Arc<NetworkPoolRegistry>, String)>,
}

impl CasualCallerProducer {
    /// Creates a producer opening a dedicated transport per caller.
    ///
    /// Every caller it creates registers branches in `pending`, which should
    /// be the one registry of the process.
    pub fn new(
        config: ClientConfig,
        connector: Arc<dyn NetworkConnector>,
        transaction_manager: Arc<dyn TransactionManager>,
        pending: Arc<PendingBranchRegistry>,
    ) -> Self {
        Self {
            config,
            connector,
            transaction_manager,
            pending,
            network_pool: None,
        }
    }

    /// Draws transports from the named pool of `registry` instead of
    /// connecting directly.
    pub fn with_network_pool(
        mut self,
        registry: Arc<NetworkPoolRegistry>,
        pool_name: impl Into<String>,
    ) -> Self {
        self.network_pool = Some((registry, pool_name.into()));
        self
    }

    /// Returns the registry of pending transaction branches.
    pub fn pending_branches(&self) -> &Arc<PendingBranchRegistry> {
        &self.pending
    }
}

#[async_trait]
impl CallerProducer for CasualCallerProducer {
    async fn create_caller(
        &self,
        address: &Address,
        listener: Arc<dyn NetworkListener>,
    ) -> Result<Arc<Caller>> {
        let builder = Caller::builder()
            .config(&self.config)
            .address(address.clone())
            .network_listener(listener)
            .transaction_manager(Arc::clone(&self.transaction_manager))
            .pending_branches(Arc::clone(&self.pending));

        let builder = match &self.network_pool {
            Some((registry, name)) => builder.network_pool(Arc::clone(registry), name.clone()),
            None => builder.connector(Arc::clone(&self.connector)),
        };

        let caller = builder.build().await?;
        Ok(Arc::new(caller))
    }
}

impl std::fmt::Debug for CasualCallerProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasualCallerProducer")
            .field("domain", &self.config.domain().name())
            .field(
                "network_pool",
                &self.network_pool.as_ref().map(|(_, name)| name.as_str()),
            )
            .finish()
    }
}
