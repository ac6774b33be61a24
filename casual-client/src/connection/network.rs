//! The network transport contract the connector is built on.
//!
//! Encoding messages and running the transport event loop happen behind
//! these traits; the rest of the crate only sees correlated requests and
//! replies.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use casual_core::{CasualError, Message, NetworkMessage, ProtocolVersion, Result};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::Address;

/// A live, bidirectional channel to a remote domain.
pub trait NetworkConnection: Send + Sync {
    /// Returns the identity of the underlying transport.
    fn id(&self) -> Uuid;

    /// Sends `message` and returns the reply carrying the same correlation id.
    fn request(&self, message: NetworkMessage) -> Result<PendingReply>;

    /// Sends `message` without expecting a reply.
    fn send(&self, message: NetworkMessage) -> Result<()>;

    /// Waits for an out-of-band message with the given correlation id.
    fn receive(&self, correlation_id: Uuid) -> Result<PendingReply>;

    /// Closes the transport.
    fn close(&self);

    /// Registers a listener notified when the transport disconnects.
    fn add_listener(&self, listener: Arc<dyn NetworkListener>);
}

/// Receives disconnect notifications from a transport.
///
/// Called on a transport thread; implementations must not block.
pub trait NetworkListener: Send + Sync {
    /// The transport has disconnected, with the failure if there was one.
    fn disconnected(&self, cause: Option<&CasualError>);
}

/// Establishes transports to remote domains.
#[async_trait]
pub trait NetworkConnector: Send + Sync {
    /// Connects to `address`, registering `listener` for disconnects.
    async fn connect(
        &self,
        address: &Address,
        version: ProtocolVersion,
        listener: Arc<dyn NetworkListener>,
    ) -> Result<Arc<dyn NetworkConnection>>;
}

/// A reply that has not arrived yet.
pub struct PendingReply {
    correlation_id: Uuid,
    receiver: oneshot::Receiver<Result<NetworkMessage>>,
}

impl PendingReply {
    /// Creates a pending reply and the sender the transport completes it with.
    pub fn channel(correlation_id: Uuid) -> (oneshot::Sender<Result<NetworkMessage>>, Self) {
        let (tx, receiver) = oneshot::channel();
        (
            tx,
            Self {
                correlation_id,
                receiver,
            },
        )
    }

    /// Creates a reply that is already available.
    pub fn ready(message: NetworkMessage) -> Self {
        let (tx, pending) = Self::channel(message.correlation_id());
        let _ = tx.send(Ok(message));
        pending
    }

    /// Returns the correlation id this reply is waiting for.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Waits for the reply.
    ///
    /// Fails with a connection error if the transport drops the request, and
    /// with a protocol error if the reply belongs to another request.
    pub async fn get(self) -> Result<NetworkMessage> {
        let correlation_id = self.correlation_id;
        let message = self.receiver.await.map_err(|_| {
            CasualError::Connection(format!("reply channel closed for {correlation_id}"))
        })??;

        if message.correlation_id() != correlation_id {
            return Err(CasualError::Protocol(format!(
                "reply correlation id {} does not match request {}",
                message.correlation_id(),
                correlation_id
            )));
        }
        Ok(message)
    }

    /// Waits for the reply and converts it to the expected payload type.
    pub async fn reply<T>(self) -> Result<T>
    where
        T: TryFrom<Message, Error = CasualError>,
    {
        self.get().await?.into_payload()
    }
}

impl fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReply")
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}
