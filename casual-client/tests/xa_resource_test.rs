//! Integration tests for the XA resource bridge.

mod common;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use casual_client::{Caller, PendingBranchRegistry, XaResource};
use casual_core::protocol::constants::{
    XA_TMFAIL, XA_TMJOIN, XA_TMNOFLAGS, XA_TMONEPHASE, XA_TMRESUME, XA_TMSUCCESS, XA_TMSUSPEND,
};
use casual_core::protocol::ResourceOperation;
use casual_core::{CasualError, Message, Result, XaReturnCode, Xid};

use common::{FakeDomain, RecordingTransactionManager, ScriptedNetwork};

async fn caller_with(
    network: Arc<ScriptedNetwork>,
    pending: Arc<PendingBranchRegistry>,
) -> Caller {
    Caller::builder()
        .network(network)
        .transaction_manager(RecordingTransactionManager::new())
        .pending_branches(pending)
        .build()
        .await
        .expect("failed to build caller")
}

async fn caller_sharing(pending: &Arc<PendingBranchRegistry>) -> Caller {
    caller_with(
        ScriptedNetwork::new(FakeDomain::default()),
        Arc::clone(pending),
    )
    .await
}

async fn single(domain: FakeDomain) -> (Arc<ScriptedNetwork>, Caller) {
    let network = ScriptedNetwork::new(domain);
    let caller = caller_with(Arc::clone(&network), Arc::default()).await;
    (network, caller)
}

fn resource_requests(network: &ScriptedNetwork) -> Vec<(ResourceOperation, i32)> {
    network
        .requests()
        .into_iter()
        .filter_map(|message| match message {
            Message::TransactionResourceRequest(request) => {
                Some((request.operation, request.flags))
            }
            _ => None,
        })
        .collect()
}

fn xa_code(result: Result<()>) -> Option<XaReturnCode> {
    result.err().and_then(|err| err.xa_code())
}

#[tokio::test]
async fn test_duplicate_branch_rejected_until_end() {
    let pending = Arc::new(PendingBranchRegistry::new());
    let first = caller_sharing(&pending).await;
    let second = caller_sharing(&pending).await;
    let xid = Xid::generate();

    first.xa_resource().start(&xid, XA_TMNOFLAGS).await.unwrap();
    assert!(pending.is_pending(&xid));

    let duplicate = second.xa_resource().start(&xid, XA_TMNOFLAGS).await;
    assert_eq!(xa_code(duplicate), Some(XaReturnCode::XaerDupid));

    first.xa_resource().end(&xid, XA_TMSUCCESS).await.unwrap();
    assert!(!pending.is_pending(&xid));

    second.xa_resource().start(&xid, XA_TMNOFLAGS).await.unwrap();
    assert_eq!(second.xa_resource().current_xid(), xid);
}

#[tokio::test]
async fn test_join_and_resume_accept_pending_branch() {
    let pending = Arc::new(PendingBranchRegistry::new());
    let first = caller_sharing(&pending).await;
    let second = caller_sharing(&pending).await;
    let third = caller_sharing(&pending).await;
    let xid = Xid::generate();

    first.xa_resource().start(&xid, XA_TMNOFLAGS).await.unwrap();
    second.xa_resource().start(&xid, XA_TMJOIN).await.unwrap();
    third.xa_resource().start(&xid, XA_TMRESUME).await.unwrap();
}

#[tokio::test]
async fn test_start_null_xid_is_protocol_error() {
    let (_network, caller) = single(FakeDomain::default()).await;

    for flags in [XA_TMNOFLAGS, XA_TMJOIN, XA_TMRESUME] {
        let result = caller.xa_resource().start(&Xid::null(), flags).await;
        assert_eq!(xa_code(result), Some(XaReturnCode::XaerProto));
    }
}

#[tokio::test]
async fn test_start_while_associated_is_protocol_error() {
    let (_network, caller) = single(FakeDomain::default()).await;
    let xa = caller.xa_resource();

    xa.start(&Xid::generate(), XA_TMNOFLAGS).await.unwrap();
    let result = xa.start(&Xid::generate(), XA_TMNOFLAGS).await;
    assert_eq!(xa_code(result), Some(XaReturnCode::XaerProto));
}

#[tokio::test]
async fn test_same_branch_started_twice_on_one_resource_fails() {
    let (_network, caller) = single(FakeDomain::default()).await;
    let xa = caller.xa_resource();
    let xid = Xid::generate();

    xa.start(&xid, XA_TMNOFLAGS).await.unwrap();
    assert!(xa.start(&xid, XA_TMNOFLAGS).await.is_err());

    xa.end(&xid, XA_TMSUCCESS).await.unwrap();
    xa.start(&xid, XA_TMNOFLAGS).await.unwrap();
}

#[tokio::test]
async fn test_end_suspend_on_other_branch_is_protocol_error() {
    let (_network, caller) = single(FakeDomain::default()).await;
    let xa = caller.xa_resource();

    xa.start(&Xid::generate(), XA_TMNOFLAGS).await.unwrap();
    let result = xa.end(&Xid::generate(), XA_TMSUSPEND).await;
    assert_eq!(xa_code(result), Some(XaReturnCode::XaerProto));

    let result = xa.end(&Xid::generate(), XA_TMFAIL).await;
    assert_eq!(xa_code(result), Some(XaReturnCode::XaerProto));
}

#[tokio::test]
async fn test_end_suspend_on_associated_branch_disassociates() {
    let pending = Arc::new(PendingBranchRegistry::new());
    let caller = caller_sharing(&pending).await;
    let xa = caller.xa_resource();
    let xid = Xid::generate();

    xa.start(&xid, XA_TMNOFLAGS).await.unwrap();
    xa.end(&xid, XA_TMSUSPEND).await.unwrap();

    assert!(xa.current_xid().is_null());
    assert!(!pending.is_pending(&xid));
}

#[tokio::test]
async fn test_end_success_disassociates() {
    let pending = Arc::new(PendingBranchRegistry::new());
    let caller = caller_sharing(&pending).await;
    let xa = caller.xa_resource();
    let xid = Xid::generate();

    xa.start(&xid, XA_TMNOFLAGS).await.unwrap();
    assert_eq!(xa.current_xid(), xid);

    xa.end(&xid, XA_TMSUCCESS).await.unwrap();
    assert!(xa.current_xid().is_null());
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_end_success_on_other_branch_is_noop() {
    let (_network, caller) = single(FakeDomain::default()).await;
    let xa = caller.xa_resource();
    let xid = Xid::generate();

    xa.start(&xid, XA_TMNOFLAGS).await.unwrap();
    xa.end(&Xid::generate(), XA_TMSUCCESS).await.unwrap();
    assert_eq!(xa.current_xid(), xid);
}

#[tokio::test]
async fn test_end_without_outcome_flag_is_invalid() {
    let (_network, caller) = single(FakeDomain::default()).await;
    let xa = caller.xa_resource();
    let xid = Xid::generate();

    xa.start(&xid, XA_TMNOFLAGS).await.unwrap();
    let result = xa.end(&xid, XA_TMNOFLAGS).await;
    assert_eq!(xa_code(result), Some(XaReturnCode::XaerInval));
}

#[tokio::test]
async fn test_prepare_forwards_to_remote() {
    let (network, caller) = single(FakeDomain::default()).await;
    let xid = Xid::generate();

    let code = caller.xa_resource().prepare(&xid).await.unwrap();
    assert_eq!(code, XaReturnCode::XaOk);
    assert_eq!(
        resource_requests(&network),
        vec![(ResourceOperation::Prepare, XA_TMNOFLAGS)]
    );
}

#[tokio::test]
async fn test_prepare_read_only_skips_transport_afterwards() {
    let domain = FakeDomain {
        resource_code: XaReturnCode::XaRdonly,
        ..FakeDomain::default()
    };
    let (network, caller) = single(domain).await;
    let xa = caller.xa_resource();
    let xid = Xid::generate();

    assert_eq!(xa.prepare(&xid).await.unwrap(), XaReturnCode::XaRdonly);
    assert!(xa.is_read_only());
    assert_eq!(network.requests_of("TransactionResourceRequest"), 1);

    assert_eq!(xa.prepare(&xid).await.unwrap(), XaReturnCode::XaRdonly);
    assert_eq!(network.requests_of("TransactionResourceRequest"), 1);
}

#[tokio::test]
async fn test_start_clears_read_only() {
    let domain = FakeDomain {
        resource_code: XaReturnCode::XaRdonly,
        ..FakeDomain::default()
    };
    let (_network, caller) = single(domain).await;
    let xa = caller.xa_resource();

    xa.prepare(&Xid::generate()).await.unwrap();
    assert!(xa.is_read_only());

    xa.start(&Xid::generate(), XA_TMNOFLAGS).await.unwrap();
    assert!(!xa.is_read_only());
}

#[tokio::test]
async fn test_duplicate_start_still_clears_read_only() {
    let pending = Arc::new(PendingBranchRegistry::new());
    let network = ScriptedNetwork::new(FakeDomain {
        resource_code: XaReturnCode::XaRdonly,
        ..FakeDomain::default()
    });
    let owner = caller_sharing(&pending).await;
    let caller = caller_with(network, Arc::clone(&pending)).await;
    let xa = caller.xa_resource();
    let xid = Xid::generate();

    owner.xa_resource().start(&xid, XA_TMNOFLAGS).await.unwrap();
    xa.prepare(&Xid::generate()).await.unwrap();
    assert!(xa.is_read_only());

    let duplicate = xa.start(&xid, XA_TMNOFLAGS).await;
    assert_eq!(xa_code(duplicate), Some(XaReturnCode::XaerDupid));
    assert!(!xa.is_read_only());
    assert!(xa.current_xid().is_null());
}

#[tokio::test]
async fn test_prepare_null_xid_is_protocol_error() {
    let (network, caller) = single(FakeDomain::default()).await;

    let err = caller.xa_resource().prepare(&Xid::null()).await.unwrap_err();
    assert_eq!(err.xa_code(), Some(XaReturnCode::XaerProto));
    assert_eq!(network.request_count(), 0);
}

#[tokio::test]
async fn test_prepare_failure_carries_remote_code() {
    let domain = FakeDomain {
        resource_code: XaReturnCode::XaRbrollback,
        ..FakeDomain::default()
    };
    let (_network, caller) = single(domain).await;

    let err = caller
        .xa_resource()
        .prepare(&Xid::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, CasualError::Xa(XaReturnCode::XaRbrollback)));
}

#[tokio::test]
async fn test_commit_flags() {
    let (network, caller) = single(FakeDomain::default()).await;
    let xa = caller.xa_resource();
    let xid = Xid::generate();

    xa.commit(&xid, true).await.unwrap();
    xa.commit(&xid, false).await.unwrap();

    assert_eq!(
        resource_requests(&network),
        vec![
            (ResourceOperation::Commit, XA_TMONEPHASE),
            (ResourceOperation::Commit, XA_TMNOFLAGS),
        ]
    );
}

#[tokio::test]
async fn test_commit_and_rollback_failures() {
    let domain = FakeDomain {
        resource_code: XaReturnCode::XaerRmfail,
        ..FakeDomain::default()
    };
    let (_network, caller) = single(domain).await;
    let xa = caller.xa_resource();
    let xid = Xid::generate();

    assert_eq!(
        xa_code(xa.commit(&xid, false).await),
        Some(XaReturnCode::XaerRmfail)
    );
    assert_eq!(xa_code(xa.rollback(&xid).await), Some(XaReturnCode::XaerRmfail));
}

#[tokio::test]
async fn test_rollback_forwards_to_remote() {
    let (network, caller) = single(FakeDomain::default()).await;

    caller.xa_resource().rollback(&Xid::generate()).await.unwrap();
    assert_eq!(
        resource_requests(&network),
        vec![(ResourceOperation::Rollback, XA_TMNOFLAGS)]
    );
}

#[tokio::test]
async fn test_forget_and_recover() {
    let (network, caller) = single(FakeDomain::default()).await;
    let xa = caller.xa_resource();

    let result = xa.forget(&Xid::generate()).await;
    assert_eq!(xa_code(result), Some(XaReturnCode::XaerNota));
    assert!(xa.recover(XA_TMNOFLAGS).await.unwrap().is_empty());
    assert_eq!(network.request_count(), 0);
}

#[tokio::test]
async fn test_transaction_timeout() {
    let (_network, caller) = single(FakeDomain::default()).await;
    let xa = caller.xa_resource();

    assert_eq!(xa.transaction_timeout(), Duration::ZERO);
    assert!(xa.set_transaction_timeout(Duration::from_secs(30)));
    assert_eq!(xa.transaction_timeout(), Duration::from_secs(30));
    assert_eq!(
        caller.connection().transaction_timeout(),
        Duration::from_secs(30)
    );
}

struct ForeignResource;

#[async_trait]
impl XaResource for ForeignResource {
    async fn start(&self, _xid: &Xid, _flags: i32) -> Result<()> {
        Ok(())
    }
    async fn end(&self, _xid: &Xid, _flags: i32) -> Result<()> {
        Ok(())
    }
    async fn prepare(&self, _xid: &Xid) -> Result<XaReturnCode> {
        Ok(XaReturnCode::XaOk)
    }
    async fn commit(&self, _xid: &Xid, _one_phase: bool) -> Result<()> {
        Ok(())
    }
    async fn rollback(&self, _xid: &Xid) -> Result<()> {
        Ok(())
    }
    async fn forget(&self, _xid: &Xid) -> Result<()> {
        Ok(())
    }
    async fn recover(&self, _flags: i32) -> Result<Vec<Xid>> {
        Ok(Vec::new())
    }
    fn transaction_timeout(&self) -> Duration {
        Duration::ZERO
    }
    fn set_transaction_timeout(&self, _timeout: Duration) -> bool {
        false
    }
    fn is_same_rm(&self, _other: &dyn XaResource) -> bool {
        false
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[tokio::test]
async fn test_is_same_rm() {
    let shared = ScriptedNetwork::new(FakeDomain::default());
    let a = caller_with(Arc::clone(&shared), Arc::default()).await;
    let b = caller_with(Arc::clone(&shared), Arc::default()).await;
    let (_other_network, c) = single(FakeDomain::default()).await;

    assert!(a.xa_resource().is_same_rm(b.xa_resource().as_ref()));
    assert!(!a.xa_resource().is_same_rm(c.xa_resource().as_ref()));
    assert!(!a.xa_resource().is_same_rm(&ForeignResource));
}
