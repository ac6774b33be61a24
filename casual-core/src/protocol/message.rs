//! Typed request and reply messages exchanged with a remote domain.
//!
//! These are the logical messages only; encoding them onto the wire is the
//! job of the network transport.

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use super::error_state::ErrorState;
use super::flags::AtmiFlags;
use super::queue::QueueMessage;
use super::service::{CasualBuffer, TransactionType};
use super::xid::Xid;
use super::XaReturnCode;
use crate::{CasualError, Result};

/// Protocol version negotiated with the remote domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    /// Version 1.0.
    #[default]
    V1_0,
    /// Version 1.1.
    V1_1,
    /// Version 1.2.
    V1_2,
}

impl ProtocolVersion {
    /// Returns the numeric wire version.
    pub fn version(&self) -> u64 {
        match self {
            Self::V1_0 => 1000,
            Self::V1_1 => 1001,
            Self::V1_2 => 1002,
        }
    }
}

/// Asks the remote domain which of the named services and queues it knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDiscoveryRequest {
    pub execution: Uuid,
    pub domain_id: Uuid,
    pub domain_name: String,
    pub service_names: Vec<String>,
    pub queue_names: Vec<String>,
}

/// A service record in a discovery reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub name: String,
    pub category: String,
    pub transaction_type: TransactionType,
    pub timeout: Duration,
    pub hops: u16,
}

/// A queue record in a discovery reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    pub name: String,
    pub retries: u64,
}

/// The services and queues a remote domain reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDiscoveryReply {
    pub execution: Uuid,
    pub domain_id: Uuid,
    pub domain_name: String,
    pub services: Vec<ServiceRecord>,
    pub queues: Vec<QueueRecord>,
}

/// Invokes a remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCallRequest {
    pub execution: Uuid,
    pub service_name: String,
    pub xid: Xid,
    pub timeout: Duration,
    pub flags: AtmiFlags,
    pub buffer: CasualBuffer,
}

/// The outcome of a remote service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCallReply {
    pub execution: Uuid,
    pub error: ErrorState,
    pub user_code: i64,
    pub xid: Xid,
    pub buffer: CasualBuffer,
}

/// Stores a message in a remote queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueRequest {
    pub execution: Uuid,
    pub xid: Xid,
    pub queue_name: String,
    pub message: QueueMessage,
}

/// The outcome of an enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueReply {
    pub execution: Uuid,
    pub id: Uuid,
    pub error: ErrorState,
}

/// Takes a message from a remote queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequeueRequest {
    pub execution: Uuid,
    pub xid: Xid,
    pub queue_name: String,
    pub selector_properties: String,
    pub selector_id: Uuid,
    pub block: bool,
}

/// The outcome of a dequeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequeueReply {
    pub execution: Uuid,
    pub messages: Vec<QueueMessage>,
    pub error: ErrorState,
}

/// The two-phase-commit verb a resource request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceOperation {
    /// Phase one.
    Prepare,
    /// Phase two, commit.
    Commit,
    /// Phase two, rollback.
    Rollback,
}

impl fmt::Display for ResourceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => f.write_str("prepare"),
            Self::Commit => f.write_str("commit"),
            Self::Rollback => f.write_str("rollback"),
        }
    }
}

/// A two-phase-commit request forwarded to the remote coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResourceRequest {
    pub execution: Uuid,
    pub operation: ResourceOperation,
    pub xid: Xid,
    pub resource_id: i32,
    pub flags: i32,
}

/// The remote coordinator's answer to a resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResourceReply {
    pub execution: Uuid,
    pub operation: ResourceOperation,
    pub xid: Xid,
    pub resource_id: i32,
    pub return_code: XaReturnCode,
}

/// Every message the connector sends or expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    DomainDiscoveryRequest(DomainDiscoveryRequest),
    DomainDiscoveryReply(DomainDiscoveryReply),
    ServiceCallRequest(ServiceCallRequest),
    ServiceCallReply(ServiceCallReply),
    EnqueueRequest(EnqueueRequest),
    EnqueueReply(EnqueueReply),
    DequeueRequest(DequeueRequest),
    DequeueReply(DequeueReply),
    TransactionResourceRequest(TransactionResourceRequest),
    TransactionResourceReply(TransactionResourceReply),
}

macro_rules! message_variants {
    ($($variant:ident),* $(,)?) => {
        impl Message {
            /// Returns the name of this message kind.
            pub fn kind(&self) -> &'static str {
                match self {
                    $(Message::$variant(_) => stringify!($variant),)*
                }
            }
        }

        $(
            impl From<$variant> for Message {
                fn from(value: $variant) -> Self {
                    Message::$variant(value)
                }
            }

            impl TryFrom<Message> for $variant {
                type Error = CasualError;

                fn try_from(message: Message) -> Result<Self> {
                    match message {
                        Message::$variant(value) => Ok(value),
                        other => Err(CasualError::Protocol(format!(
                            "expected {} but got {}",
                            stringify!($variant),
                            other.kind()
                        ))),
                    }
                }
            }
        )*
    };
}

message_variants!(
    DomainDiscoveryRequest,
    DomainDiscoveryReply,
    ServiceCallRequest,
    ServiceCallReply,
    EnqueueRequest,
    EnqueueReply,
    DequeueRequest,
    DequeueReply,
    TransactionResourceRequest,
    TransactionResourceReply,
);

/// A message together with the correlation id pairing a request to its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMessage {
    correlation_id: Uuid,
    message: Message,
}

impl NetworkMessage {
    /// Wraps `message` under a fresh correlation id.
    pub fn new(message: impl Into<Message>) -> Self {
        Self::with_correlation_id(Uuid::new_v4(), message)
    }

    /// Wraps `message` under the given correlation id, used for replies.
    pub fn with_correlation_id(correlation_id: Uuid, message: impl Into<Message>) -> Self {
        Self {
            correlation_id,
            message: message.into(),
        }
    }

    /// Returns the correlation id.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Returns the wrapped message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Unwraps the message, converting it to the expected payload type.
    pub fn into_payload<T>(self) -> Result<T>
    where
        T: TryFrom<Message, Error = CasualError>,
    {
        T::try_from(self.message)
    }
}
