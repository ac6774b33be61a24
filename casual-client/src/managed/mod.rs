//! Managed connections: callers that reconnect on their own, and a pool of them.

mod connection;
mod pool;
mod reconnect;

pub use connection::{ConnectionEvent, ManagedConnection};
pub use pool::ManagedConnectionPool;
pub use reconnect::{AutoReconnect, Reconnectable, StaggeredOptions};
