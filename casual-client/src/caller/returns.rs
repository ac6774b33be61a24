//! Results of service and queue calls.

use casual_core::protocol::ServiceCallReply;
use casual_core::{CasualBuffer, ErrorState, QueueMessage, Result};
use uuid::Uuid;

use crate::connection::PendingReply;

/// Whether a service call succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceReturnState {
    /// The service succeeded.
    TpSuccess,
    /// The service failed or could not be called.
    TpFail,
}

/// The outcome of a service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReturn {
    payload: Option<CasualBuffer>,
    state: ServiceReturnState,
    error: ErrorState,
    user_code: i64,
}

impl ServiceReturn {
    /// Creates a service return.
    pub fn new(
        payload: Option<CasualBuffer>,
        state: ServiceReturnState,
        error: ErrorState,
        user_code: i64,
    ) -> Self {
        Self {
            payload,
            state,
            error,
            user_code,
        }
    }

    /// The outcome for a service the remote domain does not know.
    pub fn not_found() -> Self {
        Self::new(None, ServiceReturnState::TpFail, ErrorState::Tpenoent, 0)
    }

    /// Returns the reply payload.
    pub fn payload(&self) -> Option<&CasualBuffer> {
        self.payload.as_ref()
    }

    /// Consumes the return, yielding its payload.
    pub fn into_payload(self) -> Option<CasualBuffer> {
        self.payload
    }

    /// Returns whether the call succeeded.
    pub fn state(&self) -> ServiceReturnState {
        self.state
    }

    /// Returns the remote error state.
    pub fn error(&self) -> ErrorState {
        self.error
    }

    /// Returns the user defined return code.
    pub fn user_code(&self) -> i64 {
        self.user_code
    }

    /// Returns true for [`ServiceReturnState::TpSuccess`].
    pub fn is_success(&self) -> bool {
        self.state == ServiceReturnState::TpSuccess
    }
}

impl From<ServiceCallReply> for ServiceReturn {
    fn from(reply: ServiceCallReply) -> Self {
        let state = if reply.error.is_ok() {
            ServiceReturnState::TpSuccess
        } else {
            ServiceReturnState::TpFail
        };
        Self::new(Some(reply.buffer), state, reply.error, reply.user_code)
    }
}

enum CallState {
    Pending(PendingReply),
    Ready(ServiceReturn),
}

/// A service call whose reply may not have arrived yet.
pub struct ServiceCallFuture {
    state: CallState,
}

impl ServiceCallFuture {
    pub(crate) fn pending(reply: PendingReply) -> Self {
        Self {
            state: CallState::Pending(reply),
        }
    }

    pub(crate) fn ready(value: ServiceReturn) -> Self {
        Self {
            state: CallState::Ready(value),
        }
    }

    /// Returns true if the result is already available.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, CallState::Ready(_))
    }

    /// Waits for the service call to complete.
    pub async fn get(self) -> Result<ServiceReturn> {
        match self.state {
            CallState::Ready(value) => Ok(value),
            CallState::Pending(reply) => {
                let reply: ServiceCallReply = reply.reply().await?;
                Ok(reply.into())
            }
        }
    }
}

impl std::fmt::Debug for ServiceCallFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCallFuture")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// The outcome of an enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueReturn {
    id: Option<Uuid>,
    error: ErrorState,
}

impl EnqueueReturn {
    /// Creates an enqueue return.
    pub fn new(id: Option<Uuid>, error: ErrorState) -> Self {
        Self { id, error }
    }

    /// The outcome for a queue the remote domain does not know.
    pub fn not_found() -> Self {
        Self::new(None, ErrorState::Tpenoent)
    }

    /// Returns the id of the stored message.
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    /// Returns the remote error state.
    pub fn error(&self) -> ErrorState {
        self.error
    }
}

/// The outcome of a dequeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DequeueReturn {
    message: Option<QueueMessage>,
    error: ErrorState,
}

impl DequeueReturn {
    /// Creates a dequeue return.
    pub fn new(message: Option<QueueMessage>, error: ErrorState) -> Self {
        Self { message, error }
    }

    /// The outcome for a queue the remote domain does not know.
    pub fn not_found() -> Self {
        Self::new(None, ErrorState::Tpenoent)
    }

    /// Returns the dequeued message, if one matched.
    pub fn message(&self) -> Option<&QueueMessage> {
        self.message.as_ref()
    }

    /// Consumes the return, yielding the dequeued message.
    pub fn into_message(self) -> Option<QueueMessage> {
        self.message
    }

    /// Returns the remote error state.
    pub fn error(&self) -> ErrorState {
        self.error
    }
}
