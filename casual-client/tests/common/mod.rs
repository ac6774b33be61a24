//! Common test utilities for integration tests.
//!
//! Provides an in-memory transport answering like a small casual domain, a
//! connector handing out such transports, and a transaction manager that
//! records how resources were enlisted.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use casual_client::{
    Address, Caller, NetworkConnection, NetworkConnector, NetworkListener,
    PendingBranchRegistry, PendingReply, Transaction, TransactionManager, XaResource,
};
use casual_core::protocol::constants::{XA_TMFAIL, XA_TMNOFLAGS, XA_TMSUCCESS};
use casual_core::protocol::{
    DequeueReply, DomainDiscoveryReply, EnqueueReply, QueueRecord, ServiceCallReply,
    ServiceRecord, TransactionResourceReply, TransactionType,
};
use casual_core::{
    CasualBuffer, CasualError, ErrorState, Message, NetworkMessage, ProtocolVersion,
    QueueMessage, Result, XaReturnCode, Xid,
};
use tokio::sync::oneshot;
use uuid::Uuid;

pub const SERVICE: &str = "TOUPPER";
pub const QUEUE: &str = "orders";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn address() -> Address {
    Address::new("casual.test", 7772)
}

pub fn buffer(text: &'static str) -> CasualBuffer {
    CasualBuffer::octet(bytes::Bytes::from_static(text.as_bytes()))
}

/// How the fake domain answers requests.
#[derive(Debug, Clone)]
pub struct FakeDomain {
    pub services: Vec<String>,
    pub queues: Vec<String>,
    pub service_error: ErrorState,
    pub queue_error: ErrorState,
    pub resource_code: XaReturnCode,
}

impl Default for FakeDomain {
    fn default() -> Self {
        Self {
            services: vec![SERVICE.to_string()],
            queues: vec![QUEUE.to_string()],
            service_error: ErrorState::Ok,
            queue_error: ErrorState::Ok,
            resource_code: XaReturnCode::XaOk,
        }
    }
}

impl FakeDomain {
    fn answer(&self, message: &Message) -> Option<Message> {
        let reply: Message = match message {
            Message::DomainDiscoveryRequest(request) => DomainDiscoveryReply {
                execution: request.execution,
                domain_id: Uuid::new_v4(),
                domain_name: "fake-domain".to_string(),
                services: request
                    .service_names
                    .iter()
                    .filter(|name| self.services.contains(name))
                    .map(|name| ServiceRecord {
                        name: name.clone(),
                        category: "test".to_string(),
                        transaction_type: TransactionType::Automatic,
                        timeout: Duration::from_secs(10),
                        hops: 0,
                    })
                    .collect(),
                queues: request
                    .queue_names
                    .iter()
                    .filter(|name| self.queues.contains(name))
                    .map(|name| QueueRecord {
                        name: name.clone(),
                        retries: 0,
                    })
                    .collect(),
            }
            .into(),
            Message::ServiceCallRequest(request) => ServiceCallReply {
                execution: request.execution,
                error: self.service_error,
                user_code: 0,
                xid: request.xid.clone(),
                buffer: request.buffer.clone(),
            }
            .into(),
            Message::EnqueueRequest(request) => EnqueueReply {
                execution: request.execution,
                id: request.message.id(),
                error: self.queue_error,
            }
            .into(),
            Message::DequeueRequest(request) => DequeueReply {
                execution: request.execution,
                messages: if self.queue_error.is_ok() {
                    vec![QueueMessage::new(buffer("dequeued"))]
                } else {
                    Vec::new()
                },
                error: self.queue_error,
            }
            .into(),
            Message::TransactionResourceRequest(request) => TransactionResourceReply {
                execution: request.execution,
                operation: request.operation,
                xid: request.xid.clone(),
                resource_id: request.resource_id,
                return_code: self.resource_code,
            }
            .into(),
            _ => return None,
        };
        Some(reply)
    }
}

type Parked = (Uuid, Message, oneshot::Sender<Result<NetworkMessage>>);

/// An in-memory transport answering from a [`FakeDomain`].
pub struct ScriptedNetwork {
    id: Uuid,
    domain: Mutex<FakeDomain>,
    requests: Mutex<Vec<Message>>,
    listeners: Mutex<Vec<Arc<dyn NetworkListener>>>,
    deferred: AtomicBool,
    parked: Mutex<Vec<Parked>>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    notify_on_close: AtomicBool,
}

impl ScriptedNetwork {
    pub fn new(domain: FakeDomain) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            domain: Mutex::new(domain),
            requests: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            deferred: AtomicBool::new(false),
            parked: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            notify_on_close: AtomicBool::new(false),
        })
    }

    pub fn update_domain(&self, f: impl FnOnce(&mut FakeDomain)) {
        f(&mut self.domain.lock().unwrap());
    }

    /// Makes `close` notify listeners before returning.
    pub fn notify_listeners_on_close(&self, notify: bool) {
        self.notify_on_close.store(notify, Ordering::SeqCst);
    }

    /// Holds replies back until [`flush`](Self::flush) is called.
    pub fn defer_replies(&self, deferred: bool) {
        self.deferred.store(deferred, Ordering::SeqCst);
    }

    /// Answers every held request.
    pub fn flush(&self) {
        let parked: Vec<Parked> = self.parked.lock().unwrap().drain(..).collect();
        let domain = self.domain.lock().unwrap().clone();
        for (corrid, message, sender) in parked {
            let reply = domain
                .answer(&message)
                .map(|reply| NetworkMessage::with_correlation_id(corrid, reply))
                .ok_or_else(|| CasualError::Protocol("no scripted reply".to_string()));
            let _ = sender.send(reply);
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_of(&self, kind: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|message| message.kind() == kind)
            .count()
    }

    pub fn requests(&self) -> Vec<Message> {
        self.requests.lock().unwrap().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Marks the transport broken and notifies every listener.
    pub fn trigger_disconnect(&self, cause: Option<CasualError>) {
        self.closed.store(true, Ordering::SeqCst);
        let listeners: Vec<_> = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.disconnected(cause.as_ref());
        }
    }
}

impl NetworkConnection for ScriptedNetwork {
    fn id(&self) -> Uuid {
        self.id
    }

    fn request(&self, message: NetworkMessage) -> Result<PendingReply> {
        if self.is_closed() {
            return Err(CasualError::Connection("transport closed".to_string()));
        }
        let corrid = message.correlation_id();
        self.requests.lock().unwrap().push(message.message().clone());

        if self.deferred.load(Ordering::SeqCst) {
            let (sender, reply) = PendingReply::channel(corrid);
            self.parked
                .lock()
                .unwrap()
                .push((corrid, message.message().clone(), sender));
            return Ok(reply);
        }

        let answer = self.domain.lock().unwrap().answer(message.message());
        match answer {
            Some(reply) => Ok(PendingReply::ready(NetworkMessage::with_correlation_id(
                corrid, reply,
            ))),
            None => Err(CasualError::Protocol(format!(
                "no scripted reply for {}",
                message.message().kind()
            ))),
        }
    }

    fn send(&self, message: NetworkMessage) -> Result<()> {
        self.requests.lock().unwrap().push(message.message().clone());
        Ok(())
    }

    fn receive(&self, correlation_id: Uuid) -> Result<PendingReply> {
        let (_sender, reply) = PendingReply::channel(correlation_id);
        Ok(reply)
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.notify_on_close.load(Ordering::SeqCst) {
            let listeners: Vec<_> = self.listeners.lock().unwrap().clone();
            for listener in listeners {
                listener.disconnected(None);
            }
        }
    }

    fn add_listener(&self, listener: Arc<dyn NetworkListener>) {
        self.listeners.lock().unwrap().push(listener);
    }
}

/// Hands out [`ScriptedNetwork`]s, optionally refusing the first attempts.
pub struct FakeConnector {
    domain: Mutex<FakeDomain>,
    failures: AtomicUsize,
    connects: AtomicUsize,
    networks: Mutex<Vec<Arc<ScriptedNetwork>>>,
}

impl FakeConnector {
    pub fn new(domain: FakeDomain) -> Arc<Self> {
        Arc::new(Self {
            domain: Mutex::new(domain),
            failures: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            networks: Mutex::new(Vec::new()),
        })
    }

    /// Refuses the next `count` connection attempts.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn networks(&self) -> Vec<Arc<ScriptedNetwork>> {
        self.networks.lock().unwrap().clone()
    }

    pub fn last_network(&self) -> Arc<ScriptedNetwork> {
        self.networks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no network created")
    }
}

#[async_trait]
impl NetworkConnector for FakeConnector {
    async fn connect(
        &self,
        _address: &Address,
        _version: ProtocolVersion,
        listener: Arc<dyn NetworkListener>,
    ) -> Result<Arc<dyn NetworkConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(CasualError::Connection("connection refused".to_string()));
        }

        let network = ScriptedNetwork::new(self.domain.lock().unwrap().clone());
        network.add_listener(listener);
        self.networks.lock().unwrap().push(Arc::clone(&network));
        Ok(network)
    }
}

/// Counts disconnect notifications.
#[derive(Default)]
pub struct RecordingListener {
    disconnects: AtomicUsize,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl NetworkListener for RecordingListener {
    fn disconnected(&self, _cause: Option<&CasualError>) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a [`RecordingTransaction`] saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEvent {
    Enlisted,
    EnlistRefused,
    Delisted(i32),
}

/// A transaction that starts and ends its branch on the enlisted resource.
pub struct RecordingTransaction {
    xid: Xid,
    accept_enlist: bool,
    events: Mutex<Vec<TxEvent>>,
}

impl RecordingTransaction {
    pub fn xid(&self) -> &Xid {
        &self.xid
    }

    pub fn events(&self) -> Vec<TxEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transaction for RecordingTransaction {
    async fn enlist_resource(&self, resource: Arc<dyn XaResource>) -> Result<bool> {
        if !self.accept_enlist {
            self.events.lock().unwrap().push(TxEvent::EnlistRefused);
            return Ok(false);
        }
        resource.start(&self.xid, XA_TMNOFLAGS).await?;
        self.events.lock().unwrap().push(TxEvent::Enlisted);
        Ok(true)
    }

    async fn delist_resource(&self, resource: Arc<dyn XaResource>, flags: i32) -> Result<bool> {
        resource.end(&self.xid, flags).await?;
        self.events.lock().unwrap().push(TxEvent::Delisted(flags));
        Ok(true)
    }
}

/// A transaction manager with at most one active transaction.
#[derive(Default)]
pub struct RecordingTransactionManager {
    transaction: Mutex<Option<Arc<RecordingTransaction>>>,
    rollback_only: AtomicBool,
}

impl RecordingTransactionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Begins a transaction with a fresh branch id.
    pub fn begin(&self) -> Arc<RecordingTransaction> {
        self.begin_with(true)
    }

    /// Begins a transaction that refuses to enlist resources.
    pub fn begin_refusing(&self) -> Arc<RecordingTransaction> {
        self.begin_with(false)
    }

    fn begin_with(&self, accept_enlist: bool) -> Arc<RecordingTransaction> {
        let transaction = Arc::new(RecordingTransaction {
            xid: Xid::generate(),
            accept_enlist,
            events: Mutex::new(Vec::new()),
        });
        *self.transaction.lock().unwrap() = Some(Arc::clone(&transaction));
        self.rollback_only.store(false, Ordering::SeqCst);
        transaction
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::SeqCst)
    }
}

impl TransactionManager for RecordingTransactionManager {
    fn transaction(&self) -> Option<Arc<dyn Transaction>> {
        self.transaction
            .lock()
            .unwrap()
            .clone()
            .map(|transaction| transaction as Arc<dyn Transaction>)
    }

    fn set_rollback_only(&self) -> Result<()> {
        self.rollback_only.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn delisted_success() -> TxEvent {
    TxEvent::Delisted(XA_TMSUCCESS)
}

pub fn delisted_fail() -> TxEvent {
    TxEvent::Delisted(XA_TMFAIL)
}

/// Builds a caller over an existing transport.
pub async fn caller_over(
    network: Arc<ScriptedNetwork>,
    manager: Arc<RecordingTransactionManager>,
) -> Caller {
    Caller::builder()
        .network(network)
        .transaction_manager(manager)
        .pending_branches(Arc::new(PendingBranchRegistry::new()))
        .build()
        .await
        .expect("failed to build caller")
}
