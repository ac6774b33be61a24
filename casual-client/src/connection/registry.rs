//! Registry of named network pools.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use casual_core::{ProtocolVersion, Result};
use tracing::instrument;

use super::pool::{NetworkConnectionPool, NetworkPoolListener, ReferenceCountedNetworkConnection};
use super::{Address, NetworkConnector, NetworkListener};
use crate::config::ClientConfig;

/// Maps pool names to network pools, creating them on first use.
///
/// A pool is dropped from the registry when obtaining a transport from it
/// fails with a connection error, or when its last transport is closed, so
/// the next request builds it again from scratch.
pub struct NetworkPoolRegistry {
    connector: Arc<dyn NetworkConnector>,
    protocol_version: ProtocolVersion,
    pool_size: usize,
    pools: Mutex<HashMap<String, Arc<NetworkConnectionPool>>>,
    me: Weak<NetworkPoolRegistry>,
}

impl NetworkPoolRegistry {
    /// Creates an empty registry whose pools hold up to `pool_size` transports each.
    pub fn new(
        connector: Arc<dyn NetworkConnector>,
        protocol_version: ProtocolVersion,
        pool_size: usize,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            connector,
            protocol_version,
            pool_size,
            pools: Mutex::new(HashMap::new()),
            me: me.clone(),
        })
    }

    /// Creates an empty registry sized from `config`.
    pub fn from_config(connector: Arc<dyn NetworkConnector>, config: &ClientConfig) -> Arc<Self> {
        Self::new(
            connector,
            config.protocol_version(),
            config.pool().network_pool_size(),
        )
    }

    /// Returns a transport from the pool named `pool_name`.
    #[instrument(
        name = "network_pool_registry.get_or_create",
        skip(self, listener),
        fields(pool = %pool_name, address = %address)
    )]
    pub async fn get_or_create(
        &self,
        pool_name: &str,
        address: &Address,
        listener: Arc<dyn NetworkListener>,
    ) -> Result<Arc<ReferenceCountedNetworkConnection>> {
        let pool = self.pool_for(pool_name, address);
        match pool.get_or_create(address, listener).await {
            Ok(connection) => Ok(connection),
            Err(err) => {
                if err.is_connection() {
                    tracing::warn!(error = %err, "removing failed network pool");
                    self.remove_pool(&pool);
                }
                Err(err)
            }
        }
    }

    /// Returns the pool registered under `name`.
    pub fn pool(&self, name: &str) -> Option<Arc<NetworkConnectionPool>> {
        self.lock().get(name).cloned()
    }

    /// Returns the number of registered pools.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no pool is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn pool_for(&self, name: &str, address: &Address) -> Arc<NetworkConnectionPool> {
        let mut pools = self.lock();
        let pool = pools.entry(name.to_string()).or_insert_with(|| {
            tracing::info!(
                pool = %name,
                address = %address,
                size = self.pool_size,
                "creating network pool"
            );
            let listener: Weak<dyn NetworkPoolListener> = self.me.clone();
            NetworkConnectionPool::with_listener(
                name,
                address.clone(),
                self.protocol_version,
                self.pool_size,
                Arc::clone(&self.connector),
                Some(listener),
            )
        });
        Arc::clone(pool)
    }

    fn remove_pool(&self, pool: &NetworkConnectionPool) {
        let mut pools = self.lock();
        let registered = pools
            .get(pool.name())
            .is_some_and(|p| std::ptr::eq(Arc::as_ptr(p), pool));
        if registered {
            pools.remove(pool.name());
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<NetworkConnectionPool>>> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NetworkPoolListener for NetworkPoolRegistry {
    fn pool_emptied(&self, pool: &NetworkConnectionPool) {
        tracing::info!(pool = %pool.name(), "network pool emptied");
        self.remove_pool(pool);
    }
}
