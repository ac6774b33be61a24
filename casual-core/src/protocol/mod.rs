//! Protocol-level value types shared with a remote casual domain.
//!
//! Encoding these onto the wire is left to the network transport; this
//! module only defines what is exchanged.

pub mod constants;
mod error_state;
mod flags;
mod message;
mod queue;
mod service;
mod xid;

pub use constants::*;
pub use error_state::ErrorState;
pub use flags::AtmiFlags;
pub use message::{
    DequeueReply, DequeueRequest, DomainDiscoveryReply, DomainDiscoveryRequest, EnqueueReply,
    EnqueueRequest, Message, NetworkMessage, ProtocolVersion, QueueRecord, ResourceOperation,
    ServiceCallReply, ServiceCallRequest, ServiceRecord, TransactionResourceReply,
    TransactionResourceRequest,
};
pub use queue::{MessageSelector, QueueInfo, QueueMessage, QueueOptions};
pub use service::{CasualBuffer, ServiceDetails, TransactionType};
pub use xid::Xid;
