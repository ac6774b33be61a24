//! Transaction support: the XA resource bridge, branch bookkeeping, and the
//! executor enlisting a connection's resource around a unit of work.
//!
//! The local transaction manager is consumed through the
//! [`TransactionManager`] and [`Transaction`] traits.
//!
//! # Example
//!
//! ```ignore
//! let wrapper = TransactionWrapper::new(manager);
//! let reply = wrapper
//!     .execute(connection.xa_resource().clone(), || async {
//!         dispatch(&connection).await
//!     })
//!     .await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use casual_core::protocol::constants::{XA_TMFAIL, XA_TMSUCCESS};
use casual_core::{CasualError, Result};
use tracing::instrument;

mod pending;
pub mod xa;

pub use pending::PendingBranchRegistry;
pub use xa::{CasualXaResource, XaResource};

/// An active local transaction.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Enlists `resource`, returning false if the transaction refused it.
    async fn enlist_resource(&self, resource: Arc<dyn XaResource>) -> Result<bool>;

    /// Delists `resource` with the given XA end flag.
    async fn delist_resource(&self, resource: Arc<dyn XaResource>, flags: i32) -> Result<bool>;
}

/// The local transaction manager.
pub trait TransactionManager: Send + Sync {
    /// Returns the transaction active for the caller, if any.
    fn transaction(&self) -> Option<Arc<dyn Transaction>>;

    /// Marks the active transaction so that it can only roll back.
    fn set_rollback_only(&self) -> Result<()>;
}

/// Runs units of work inside the caller's transaction.
///
/// When a transaction is active, the resource is enlisted before the work
/// and delisted after it. Concurrent executions through one wrapper are
/// serialized. Any failure marks the transaction rollback-only.
pub struct TransactionWrapper {
    manager: Arc<dyn TransactionManager>,
    lock: tokio::sync::Mutex<()>,
}

impl TransactionWrapper {
    /// Creates a wrapper over `manager`.
    pub fn new(manager: Arc<dyn TransactionManager>) -> Self {
        Self {
            manager,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the transaction manager.
    pub fn manager(&self) -> &Arc<dyn TransactionManager> {
        &self.manager
    }

    /// Runs `work`, enlisting `resource` if a transaction is active.
    ///
    /// Without a transaction the work runs directly and its result is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Inside a transaction, every failure is returned as
    /// [`CasualError::Transaction`] with the original failure as its source.
    #[instrument(name = "transaction_wrapper.execute", skip_all)]
    pub async fn execute<T, F, Fut>(&self, resource: Arc<dyn XaResource>, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(transaction) = self.manager.transaction() else {
            return work().await;
        };

        let _guard = self.lock.lock().await;
        match Self::run_enlisted(transaction.as_ref(), resource, work).await {
            Ok(value) => Ok(value),
            Err(err) => Err(self.mark_rollback_only(err)),
        }
    }

    async fn run_enlisted<T, F, Fut>(
        transaction: &dyn Transaction,
        resource: Arc<dyn XaResource>,
        work: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !transaction.enlist_resource(Arc::clone(&resource)).await? {
            return Err(CasualError::Transaction {
                message: "could not enlist resource!".to_string(),
                source: None,
            });
        }

        let value = match work().await {
            Ok(value) => value,
            Err(err) => {
                if let Err(delist) = transaction.delist_resource(resource, XA_TMFAIL).await {
                    tracing::warn!(error = %delist, "failed to delist resource after failure");
                }
                return Err(err);
            }
        };

        if !transaction.delist_resource(resource, XA_TMSUCCESS).await? {
            return Err(CasualError::Transaction {
                message: "could not delist resource!".to_string(),
                source: None,
            });
        }
        Ok(value)
    }

    fn mark_rollback_only(&self, err: CasualError) -> CasualError {
        tracing::warn!(error = %err, "marking transaction rollback only");
        match self.manager.set_rollback_only() {
            Ok(()) => match err {
                CasualError::Transaction { .. } => err,
                other => CasualError::transaction("transactional call failed", other),
            },
            Err(secondary) => {
                tracing::warn!(error = %secondary, "failed to set rollback only");
                CasualError::transaction(format!("failed to set rollback only: {secondary}"), err)
            }
        }
    }
}

impl std::fmt::Debug for TransactionWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionWrapper").finish_non_exhaustive()
    }
}
