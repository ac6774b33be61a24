//! A connection handle that survives transport failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use casual_core::{CasualError, Result};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::reconnect::{AutoReconnect, Reconnectable, StaggeredOptions};
use crate::caller::{Caller, CallerProducer};
use crate::config::ReconnectConfig;
use crate::connection::{Address, NetworkListener};

/// Lifecycle events of a managed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The transport reported a disconnect and the caller was dropped.
    Disconnected {
        /// The remote address.
        address: Address,
        /// The reported cause, if any.
        error: Option<String>,
    },
    /// A reconnect attempt is about to wait before connecting.
    ReconnectAttempt {
        /// The remote address.
        address: Address,
        /// The current attempt number, starting at 1.
        attempt: u32,
        /// The delay before this attempt connects.
        next_delay: Duration,
    },
    /// A new caller was installed.
    Reconnected {
        /// The remote address.
        address: Address,
    },
}

/// Forwards transport disconnects to the supervisor task.
struct DisconnectForwarder {
    sender: mpsc::UnboundedSender<Option<String>>,
}

impl NetworkListener for DisconnectForwarder {
    fn disconnected(&self, cause: Option<&CasualError>) {
        let _ = self.sender.send(cause.map(ToString::to_string));
    }
}

/// Owns at most one live [`Caller`] and replaces it after a disconnect.
///
/// While reconnecting, [`caller`](Self::caller) returns `None`. The open
/// or closed flag is bookkeeping for [`ManagedConnectionPool`]; closing does
/// not tear down the transport.
///
/// [`ManagedConnectionPool`]: super::ManagedConnectionPool
pub struct ManagedConnection {
    address: Address,
    caller: RwLock<Option<Arc<Caller>>>,
    closed: AtomicBool,
    event_sender: broadcast::Sender<ConnectionEvent>,
    _shutdown: oneshot::Sender<()>,
}

impl ManagedConnection {
    /// Connects the first caller for `address` and starts supervising it.
    ///
    /// The returned connection is open.
    ///
    /// # Errors
    ///
    /// Returns the producer's error if the first caller cannot be created.
    /// Only later disconnects are retried.
    pub async fn establish(
        address: Address,
        producer: Arc<dyn CallerProducer>,
        reconnect: ReconnectConfig,
    ) -> Result<Arc<Self>> {
        let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn NetworkListener> = Arc::new(DisconnectForwarder {
            sender: disconnect_tx,
        });

        let caller = producer
            .create_caller(&address, Arc::clone(&listener))
            .await?;

        let (event_sender, _) = broadcast::channel(16);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let connection = Arc::new(Self {
            address: address.clone(),
            caller: RwLock::new(Some(caller)),
            closed: AtomicBool::new(false),
            event_sender,
            _shutdown: shutdown_tx,
        });

        tokio::spawn(supervise(
            Arc::downgrade(&connection),
            address,
            producer,
            listener,
            reconnect,
            disconnect_rx,
            shutdown_rx,
        ));

        tracing::info!(address = %connection.address, "managed connection created");
        Ok(connection)
    }

    /// Returns the remote address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Returns the current caller, or `None` while reconnecting.
    pub fn caller(&self) -> Option<Arc<Caller>> {
        self.caller
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true if a caller is installed.
    pub fn is_connected(&self) -> bool {
        self.caller
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Marks the connection closed so a pool may hand it out again.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Marks the connection open.
    pub fn connect(&self) {
        self.closed.store(false, Ordering::Release);
    }

    /// Returns true if the connection is closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.event_sender.subscribe()
    }

    /// Reopens a closed connection. Returns false if it was already open.
    pub(crate) fn try_reopen(&self) -> bool {
        self.closed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Drops the current caller if it has seen a disconnect.
    ///
    /// Returns false for a stale notification about a caller that was
    /// already replaced.
    fn drop_caller(&self, error: Option<String>) -> bool {
        {
            let mut caller = self.caller.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(current) = caller.as_ref() {
                if !current.is_disconnected() {
                    return false;
                }
            }
            *caller = None;
        }

        tracing::warn!(
            address = %self.address,
            error = error.as_deref().unwrap_or("none"),
            "managed connection disconnected"
        );
        let _ = self.event_sender.send(ConnectionEvent::Disconnected {
            address: self.address.clone(),
            error,
        });
        true
    }
}

impl Reconnectable for ManagedConnection {
    fn set_caller(&self, caller: Arc<Caller>) {
        *self.caller.write().unwrap_or_else(PoisonError::into_inner) = Some(caller);
        tracing::info!(address = %self.address, "managed connection reconnected");
        let _ = self.event_sender.send(ConnectionEvent::Reconnected {
            address: self.address.clone(),
        });
    }

    fn reconnect_attempt(&self, attempt: u32, next_delay: Duration) {
        let _ = self.event_sender.send(ConnectionEvent::ReconnectAttempt {
            address: self.address.clone(),
            attempt,
            next_delay,
        });
    }
}

impl std::fmt::Debug for ManagedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedConnection")
            .field("address", &self.address)
            .field("connected", &self.is_connected())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Handles disconnects one at a time until the connection is dropped.
async fn supervise(
    connection: Weak<ManagedConnection>,
    address: Address,
    producer: Arc<dyn CallerProducer>,
    listener: Arc<dyn NetworkListener>,
    reconnect: ReconnectConfig,
    mut disconnects: mpsc::UnboundedReceiver<Option<String>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let error = tokio::select! {
            _ = &mut shutdown => break,
            event = disconnects.recv() => match event {
                Some(error) => error,
                None => break,
            },
        };

        let Some(managed) = connection.upgrade() else {
            break;
        };
        if !managed.drop_caller(error) {
            tracing::debug!(address = %address, "ignoring stale disconnect");
            continue;
        }
        drop(managed);

        let auto_reconnect = AutoReconnect::new(
            address.clone(),
            Arc::clone(&producer),
            Arc::clone(&listener),
            StaggeredOptions::from_config(&reconnect),
        );
        if !auto_reconnect.run(connection.clone()).await {
            break;
        }
    }

    tracing::debug!(address = %address, "managed connection supervisor stopped");
}
