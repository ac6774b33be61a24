//! Async client connector for the [casual](https://github.com/casualcore/casual)
//! transaction-processing middleware.
//!
//! The crate lets a local application take part in distributed transactions
//! and call remote services and queues of a casual domain. It is built on
//! [Tokio](https://tokio.rs/) and exposes every remote operation as an
//! `async fn`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use casual_client::{Address, Caller, ClientConfig};
//! use casual_core::{AtmiFlags, CasualBuffer};
//!
//! let config = ClientConfig::builder().domain_name("my-domain").build()?;
//! let caller = Caller::builder()
//!     .config(&config)
//!     .address(Address::new("casual.local", 7772))
//!     .connector(connector)
//!     .transaction_manager(manager)
//!     .pending_branches(Arc::clone(&pending))
//!     .build()
//!     .await?;
//!
//! let reply = caller
//!     .tpcall("TOUPPER", CasualBuffer::octet(&b"hello"[..]), AtmiFlags::NOFLAG)
//!     .await?;
//! ```
//!
//! # Transactions
//!
//! Every [`Caller`] owns a [`CasualXaResource`]. Calls made without
//! `TPNOTRAN` while the [`TransactionManager`] reports an active transaction
//! enlist that resource, run the call, and delist it again. A failed call
//! marks the transaction rollback-only before the error is returned.
//!
//! Prepare, commit and rollback are forwarded to the remote coordinator.
//! Branches started on any resource sharing a [`PendingBranchRegistry`] are
//! rejected as duplicates until they end.
//!
//! # Resilience
//!
//! A [`ManagedConnection`] replaces its caller after a transport disconnect,
//! retrying on a [`StaggeredOptions`] schedule until a new caller is
//! created. A [`ManagedConnectionPool`] hands out managed connections per
//! address; a [`NetworkPoolRegistry`] shares reference-counted transports
//! per pool name.
//!
//! # Transport
//!
//! Wire encoding is not part of this crate. Transports are supplied through
//! the [`NetworkConnector`] and [`NetworkConnection`] traits.

#![warn(missing_docs)]

pub mod caller;
pub mod config;
pub mod connection;
pub mod managed;
pub mod transaction;

pub use caller::{
    Caller, CallerBuilder, CallerProducer, CasualCallerProducer, DequeueReturn, EnqueueReturn,
    ServiceCallFuture, ServiceReturn, ServiceReturnState,
};
pub use casual_core as core;
pub use config::{
    ClientConfig, ClientConfigBuilder, ConfigError, DomainConfig, DomainConfigBuilder,
    PoolConfig, PoolConfigBuilder, ReconnectConfig, ReconnectConfigBuilder,
};
pub use connection::{
    Address, CasualConnection, NetworkConnection, NetworkConnectionPool, NetworkConnector,
    NetworkListener, NetworkPoolRegistry, PendingReply, ReferenceCountedNetworkConnection,
};
pub use managed::{
    AutoReconnect, ConnectionEvent, ManagedConnection, ManagedConnectionPool, Reconnectable,
    StaggeredOptions,
};
pub use transaction::{
    CasualXaResource, PendingBranchRegistry, Transaction, TransactionManager,
    TransactionWrapper, XaResource,
};
