//! Core types for the casual transaction-processing connector.

#![warn(missing_docs)]

pub mod error;
pub mod protocol;

pub use error::{CasualError, Result};
pub use protocol::{
    AtmiFlags, CasualBuffer, ErrorState, Message, NetworkMessage, ProtocolVersion, QueueInfo,
    QueueMessage, ServiceDetails, XaReturnCode, Xid,
};
