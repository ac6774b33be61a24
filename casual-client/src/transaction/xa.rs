//! XA resource bridging the local transaction manager to a remote domain.
//!
//! Branch association (`start`/`end`) is tracked locally; `prepare`,
//! `commit` and `rollback` are forwarded to the remote coordinator and
//! awaited.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use casual_core::protocol::constants::*;
use casual_core::protocol::{ResourceOperation, TransactionResourceReply, TransactionResourceRequest};
use casual_core::{CasualError, NetworkMessage, Result, XaReturnCode, Xid};
use tracing::instrument;
use uuid::Uuid;

use super::PendingBranchRegistry;
use crate::connection::{NetworkConnection, TransactionTimeout};

/// XA Resource interface following the X/Open XA specification.
///
/// This trait defines the contract for XA-compliant resource managers
/// that participate in distributed transactions.
#[async_trait]
pub trait XaResource: Send + Sync {
    /// Starts work on behalf of a transaction branch.
    ///
    /// # Arguments
    ///
    /// * `flags` - One of XA_TMNOFLAGS, XA_TMJOIN, or XA_TMRESUME
    async fn start(&self, xid: &Xid, flags: i32) -> Result<()>;

    /// Ends work on behalf of a transaction branch.
    ///
    /// # Arguments
    ///
    /// * `flags` - One of XA_TMSUCCESS, XA_TMFAIL, or XA_TMSUSPEND
    async fn end(&self, xid: &Xid, flags: i32) -> Result<()>;

    /// Prepares the transaction branch for commit.
    ///
    /// Returns `XaOk` if the branch can be committed, `XaRdonly` if it did
    /// no work.
    async fn prepare(&self, xid: &Xid) -> Result<XaReturnCode>;

    /// Commits the transaction branch.
    async fn commit(&self, xid: &Xid, one_phase: bool) -> Result<()>;

    /// Rolls back the transaction branch.
    async fn rollback(&self, xid: &Xid) -> Result<()>;

    /// Forgets about a heuristically completed transaction branch.
    async fn forget(&self, xid: &Xid) -> Result<()>;

    /// Obtains a list of prepared transaction branches.
    async fn recover(&self, flags: i32) -> Result<Vec<Xid>>;

    /// Returns the transaction timeout value.
    fn transaction_timeout(&self) -> Duration;

    /// Sets the transaction timeout value.
    ///
    /// Returns true if the timeout was set successfully.
    fn set_transaction_timeout(&self, timeout: Duration) -> bool;

    /// Determines if this resource manager is the same as another.
    fn is_same_rm(&self, other: &dyn XaResource) -> bool;

    /// Returns `self` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Default)]
struct BranchState {
    current: Option<Xid>,
    read_only: bool,
}

/// The XA resource of one connection.
pub struct CasualXaResource {
    network: Arc<dyn NetworkConnection>,
    resource_manager_id: i32,
    timeout: Arc<TransactionTimeout>,
    pending: Arc<PendingBranchRegistry>,
    state: Mutex<BranchState>,
}

impl CasualXaResource {
    pub(crate) fn new(
        network: Arc<dyn NetworkConnection>,
        resource_manager_id: i32,
        timeout: Arc<TransactionTimeout>,
        pending: Arc<PendingBranchRegistry>,
    ) -> Self {
        Self {
            network,
            resource_manager_id,
            timeout,
            pending,
            state: Mutex::new(BranchState::default()),
        }
    }

    /// Returns the resource manager id sent with resource requests.
    pub fn resource_manager_id(&self) -> i32 {
        self.resource_manager_id
    }

    /// Returns the identity of the underlying transport.
    pub fn connection_id(&self) -> Uuid {
        self.network.id()
    }

    /// Returns the associated branch, or the null xid.
    pub fn current_xid(&self) -> Xid {
        self.state().current.clone().unwrap_or_else(Xid::null)
    }

    /// Returns true if the last prepare reported no work.
    pub fn is_read_only(&self) -> bool {
        self.state().read_only
    }

    fn state(&self) -> MutexGuard<'_, BranchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn disassociate(&self, state: &mut BranchState, xid: &Xid) {
        self.pending.remove(xid);
        state.current = None;
    }

    async fn resource_request(
        &self,
        operation: ResourceOperation,
        xid: &Xid,
        flags: i32,
    ) -> Result<XaReturnCode> {
        let message = NetworkMessage::new(TransactionResourceRequest {
            execution: Uuid::new_v4(),
            operation,
            xid: xid.clone(),
            resource_id: self.resource_manager_id,
            flags,
        });
        tracing::debug!(corrid = %message.correlation_id(), "sending resource request");

        let reply: TransactionResourceReply = self.network.request(message)?.reply().await?;
        tracing::debug!(code = %reply.return_code, "resource request completed");
        Ok(reply.return_code)
    }
}

#[async_trait]
impl XaResource for CasualXaResource {
    #[instrument(name = "xa.start", skip(self), fields(xid = %xid))]
    async fn start(&self, xid: &Xid, flags: i32) -> Result<()> {
        if xid.is_null() {
            return Err(CasualError::Xa(XaReturnCode::XaerProto));
        }

        let mut state = self.state();
        if let Some(current) = &state.current {
            tracing::warn!(current = %current, "start while already associated");
            return Err(CasualError::Xa(XaReturnCode::XaerProto));
        }

        state.read_only = false;
        let join = flags & (XA_TMJOIN | XA_TMRESUME) != 0;
        if !self.pending.try_register(xid) && !join {
            return Err(CasualError::Xa(XaReturnCode::XaerDupid));
        }

        state.current = Some(xid.clone());
        Ok(())
    }

    #[instrument(name = "xa.end", skip(self), fields(xid = %xid))]
    async fn end(&self, xid: &Xid, flags: i32) -> Result<()> {
        let mut state = self.state();
        let associated = state.current.as_ref() == Some(xid);

        if flags & (XA_TMSUSPEND | XA_TMFAIL) != 0 {
            if !associated {
                return Err(CasualError::Xa(XaReturnCode::XaerProto));
            }
            self.disassociate(&mut state, xid);
            Ok(())
        } else if flags & XA_TMSUCCESS != 0 {
            if associated {
                self.disassociate(&mut state, xid);
            }
            Ok(())
        } else {
            Err(CasualError::Xa(XaReturnCode::XaerInval))
        }
    }

    #[instrument(name = "xa.prepare", skip(self), fields(xid = %xid))]
    async fn prepare(&self, xid: &Xid) -> Result<XaReturnCode> {
        let read_only = self.is_read_only();
        if read_only {
            return Ok(XaReturnCode::XaRdonly);
        }
        if xid.is_null() {
            return Err(CasualError::Xa(XaReturnCode::XaerProto));
        }

        let code = self
            .resource_request(ResourceOperation::Prepare, xid, XA_TMNOFLAGS)
            .await?;
        match code {
            XaReturnCode::XaOk => Ok(code),
            XaReturnCode::XaRdonly => {
                self.state().read_only = true;
                Ok(code)
            }
            other => Err(CasualError::Xa(other)),
        }
    }

    #[instrument(name = "xa.commit", skip(self), fields(xid = %xid))]
    async fn commit(&self, xid: &Xid, one_phase: bool) -> Result<()> {
        let flags = if one_phase { XA_TMONEPHASE } else { XA_TMNOFLAGS };
        let code = self
            .resource_request(ResourceOperation::Commit, xid, flags)
            .await?;
        if code.is_ok() {
            Ok(())
        } else {
            Err(CasualError::Xa(code))
        }
    }

    #[instrument(name = "xa.rollback", skip(self), fields(xid = %xid))]
    async fn rollback(&self, xid: &Xid) -> Result<()> {
        let code = self
            .resource_request(ResourceOperation::Rollback, xid, XA_TMNOFLAGS)
            .await?;
        if code.is_ok() {
            Ok(())
        } else {
            Err(CasualError::Xa(code))
        }
    }

    async fn forget(&self, _xid: &Xid) -> Result<()> {
        Err(CasualError::Xa(XaReturnCode::XaerNota))
    }

    async fn recover(&self, _flags: i32) -> Result<Vec<Xid>> {
        Ok(Vec::new())
    }

    fn transaction_timeout(&self) -> Duration {
        self.timeout.get()
    }

    fn set_transaction_timeout(&self, timeout: Duration) -> bool {
        self.timeout.set(timeout);
        true
    }

    fn is_same_rm(&self, other: &dyn XaResource) -> bool {
        other
            .as_any()
            .downcast_ref::<CasualXaResource>()
            .is_some_and(|other| other.connection_id() == self.connection_id())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for CasualXaResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("CasualXaResource")
            .field("connection", &self.network.id())
            .field("resource_manager_id", &self.resource_manager_id)
            .field("current", &state.current)
            .field("read_only", &state.read_only)
            .finish()
    }
}
