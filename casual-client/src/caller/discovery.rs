use casual_core::protocol::{DomainDiscoveryReply, DomainDiscoveryRequest};
use casual_core::{NetworkMessage, Result};
use uuid::Uuid;

use crate::config::DomainConfig;
use crate::connection::CasualConnection;

/// Asks the remote domain about the named services and queues.
pub(crate) async fn discover(
    connection: &CasualConnection,
    domain: &DomainConfig,
    service_names: Vec<String>,
    queue_names: Vec<String>,
) -> Result<DomainDiscoveryReply> {
    let message = NetworkMessage::new(DomainDiscoveryRequest {
        execution: Uuid::new_v4(),
        domain_id: domain.id(),
        domain_name: domain.name().to_string(),
        service_names,
        queue_names,
    });
    let corrid = message.correlation_id();
    tracing::debug!(corrid = %corrid, "issuing domain discovery");

    let reply: DomainDiscoveryReply = connection.network().request(message)?.reply().await?;
    tracing::debug!(
        corrid = %corrid,
        services = reply.services.len(),
        queues = reply.queues.len(),
        "domain discovery ok"
    );
    Ok(reply)
}
