//! Service half of the call dispatcher.

use std::sync::Arc;

use casual_core::protocol::ServiceCallRequest;
use casual_core::{AtmiFlags, CasualBuffer, NetworkMessage, Result, ServiceDetails};
use tracing::instrument;
use uuid::Uuid;

use super::discovery::discover;
use super::{ServiceCallFuture, ServiceReturn};
use crate::config::DomainConfig;
use crate::connection::CasualConnection;

/// Issues service calls and service discovery over one connection.
#[derive(Debug, Clone)]
pub struct ServiceCaller {
    connection: Arc<CasualConnection>,
    domain: DomainConfig,
}

impl ServiceCaller {
    /// Creates a service caller over `connection`.
    pub fn new(connection: Arc<CasualConnection>, domain: DomainConfig) -> Self {
        Self { connection, domain }
    }

    /// Calls `service` and waits for its reply.
    ///
    /// The reply state is returned as is; a failed service is not an error here.
    #[instrument(name = "service_caller.tpcall", skip(self, data), fields(service = %service))]
    pub async fn tpcall(
        &self,
        service: &str,
        data: CasualBuffer,
        flags: AtmiFlags,
    ) -> Result<ServiceReturn> {
        self.tpacall(service, data, flags)?.get().await
    }

    /// Sends a call to `service`, returning a future for its reply.
    ///
    /// The request carries the connection's current branch and transaction
    /// timeout.
    pub fn tpacall(
        &self,
        service: &str,
        data: CasualBuffer,
        flags: AtmiFlags,
    ) -> Result<ServiceCallFuture> {
        let message = NetworkMessage::new(ServiceCallRequest {
            execution: Uuid::new_v4(),
            service_name: service.to_string(),
            xid: self.connection.current_xid(),
            timeout: self.connection.transaction_timeout(),
            flags,
            buffer: data,
        });
        tracing::debug!(
            corrid = %message.correlation_id(),
            service = %service,
            flags = %flags,
            "issuing service call"
        );

        let reply = self.connection.network().request(message)?;
        Ok(ServiceCallFuture::pending(reply))
    }

    /// Asks the remote domain whether it knows `service`.
    #[instrument(name = "service_caller.exists", skip(self), fields(service = %service))]
    pub async fn service_exists(&self, service: &str) -> Result<bool> {
        let reply = discover(
            &self.connection,
            &self.domain,
            vec![service.to_string()],
            Vec::new(),
        )
        .await?;
        Ok(reply.services.iter().any(|s| s.name == service))
    }

    /// Returns the details the remote domain reports for `service`.
    pub async fn service_details(&self, service: &str) -> Result<Vec<ServiceDetails>> {
        let reply = discover(
            &self.connection,
            &self.domain,
            vec![service.to_string()],
            Vec::new(),
        )
        .await?;
        Ok(reply
            .services
            .into_iter()
            .map(|s| ServiceDetails::new(s.name, s.category, s.transaction_type, s.timeout, s.hops))
            .collect())
    }
}
