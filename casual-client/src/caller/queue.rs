//! Queue half of the call dispatcher.

use std::sync::Arc;

use casual_core::protocol::{
    DequeueReply, DequeueRequest, EnqueueReply, EnqueueRequest, MessageSelector,
};
use casual_core::{NetworkMessage, QueueInfo, QueueMessage, Result};
use tracing::instrument;
use uuid::Uuid;

use super::discovery::discover;
use super::{DequeueReturn, EnqueueReturn};
use crate::config::DomainConfig;
use crate::connection::CasualConnection;

/// Issues enqueue, dequeue and queue discovery over one connection.
#[derive(Debug, Clone)]
pub struct QueueCaller {
    connection: Arc<CasualConnection>,
    domain: DomainConfig,
}

impl QueueCaller {
    /// Creates a queue caller over `connection`.
    pub fn new(connection: Arc<CasualConnection>, domain: DomainConfig) -> Self {
        Self { connection, domain }
    }

    /// Stores `message` in the queue.
    #[instrument(
        name = "queue_caller.enqueue",
        skip(self, queue, message),
        fields(queue = %queue.queue_name())
    )]
    pub async fn enqueue(&self, queue: &QueueInfo, message: QueueMessage) -> Result<EnqueueReturn> {
        let request = NetworkMessage::new(EnqueueRequest {
            execution: Uuid::new_v4(),
            xid: self.connection.current_xid(),
            queue_name: queue.queue_name().to_string(),
            message,
        });
        tracing::debug!(corrid = %request.correlation_id(), "issuing enqueue");

        let reply: EnqueueReply = self.connection.network().request(request)?.reply().await?;
        Ok(EnqueueReturn::new(Some(reply.id), reply.error))
    }

    /// Takes the first message matching `selector` from the queue.
    #[instrument(
        name = "queue_caller.dequeue",
        skip(self, queue, selector),
        fields(queue = %queue.queue_name())
    )]
    pub async fn dequeue(
        &self,
        queue: &QueueInfo,
        selector: &MessageSelector,
    ) -> Result<DequeueReturn> {
        let request = NetworkMessage::new(DequeueRequest {
            execution: Uuid::new_v4(),
            xid: self.connection.current_xid(),
            queue_name: queue.queue_name().to_string(),
            selector_properties: selector.selector().to_string(),
            selector_id: selector.selector_id(),
            block: queue.options().is_blocking(),
        });
        tracing::debug!(corrid = %request.correlation_id(), "issuing dequeue");

        let reply: DequeueReply = self.connection.network().request(request)?.reply().await?;
        tracing::debug!(messages = reply.messages.len(), "dequeue replied");
        Ok(DequeueReturn::new(
            reply.messages.into_iter().next(),
            reply.error,
        ))
    }

    /// Asks the remote domain whether it knows the queue.
    pub async fn queue_exists(&self, queue: &QueueInfo) -> Result<bool> {
        let name = queue.queue_name();
        let reply = discover(
            &self.connection,
            &self.domain,
            Vec::new(),
            vec![name.to_string()],
        )
        .await?;
        Ok(reply.queues.iter().any(|q| q.name == name))
    }
}
