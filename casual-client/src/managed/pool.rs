//! Per-address pool of managed connections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use casual_core::{CasualError, Result};
use tracing::instrument;

use super::connection::ManagedConnection;
use crate::caller::CallerProducer;
use crate::config::{ClientConfig, ReconnectConfig};
use crate::connection::Address;

/// Hands out managed connections per address, reusing closed ones.
///
/// Each address holds at most `size` connections. A request when none is
/// closed and the address is full fails immediately with
/// [`CasualError::CapacityExceeded`].
pub struct ManagedConnectionPool {
    producer: Arc<dyn CallerProducer>,
    reconnect: ReconnectConfig,
    size: usize,
    connections: Mutex<HashMap<Address, Vec<Arc<ManagedConnection>>>>,
    create_lock: tokio::sync::Mutex<()>,
}

impl ManagedConnectionPool {
    /// Creates a pool sized and configured from `config`.
    pub fn new(producer: Arc<dyn CallerProducer>, config: &ClientConfig) -> Self {
        Self::with_size(
            producer,
            config.pool().managed_pool_size(),
            *config.reconnect(),
        )
    }

    /// Creates a pool holding up to `size` connections per address.
    pub fn with_size(
        producer: Arc<dyn CallerProducer>,
        size: usize,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            producer,
            reconnect,
            size,
            connections: Mutex::new(HashMap::new()),
            create_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the maximum number of connections per address.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the number of connections held for `address`.
    pub fn connection_count(&self, address: &Address) -> usize {
        self.lock().get(address).map_or(0, Vec::len)
    }

    /// Returns an open connection to `address`.
    ///
    /// The first closed connection is reopened and returned. Otherwise a new
    /// connection is established if the address has room.
    ///
    /// # Errors
    ///
    /// Returns [`CasualError::CapacityExceeded`] when the address is full,
    /// or the producer's error if a new connection cannot be established.
    #[instrument(
        name = "managed_pool.get_connection",
        skip(self),
        fields(address = %address)
    )]
    pub async fn get_connection(&self, address: &Address) -> Result<Arc<ManagedConnection>> {
        if let Some(connection) = self.reuse_closed(address) {
            tracing::debug!("reusing closed managed connection");
            return Ok(connection);
        }

        let _guard = self.create_lock.lock().await;

        if let Some(connection) = self.reuse_closed(address) {
            tracing::debug!("reusing closed managed connection");
            return Ok(connection);
        }

        if self.connection_count(address) >= self.size {
            return Err(CasualError::CapacityExceeded {
                pool: address.to_string(),
                size: self.size,
            });
        }

        let connection = ManagedConnection::establish(
            address.clone(),
            Arc::clone(&self.producer),
            self.reconnect,
        )
        .await?;

        let count = {
            let mut connections = self.lock();
            let entries = connections.entry(address.clone()).or_default();
            entries.push(Arc::clone(&connection));
            entries.len()
        };
        tracing::info!(connections = count, "managed connection added to pool");

        Ok(connection)
    }

    fn reuse_closed(&self, address: &Address) -> Option<Arc<ManagedConnection>> {
        self.lock()
            .get(address)?
            .iter()
            .find(|connection| connection.try_reopen())
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Address, Vec<Arc<ManagedConnection>>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ManagedConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedConnectionPool")
            .field("size", &self.size)
            .field("addresses", &self.lock().len())
            .finish()
    }
}
