//! Network transports, connection handles and transport pooling.

mod address;
mod connection;
mod network;
mod pool;
mod registry;

pub use address::Address;
pub use connection::{CasualConnection, TransactionTimeout};
pub use network::{NetworkConnection, NetworkConnector, NetworkListener, PendingReply};
pub use pool::{NetworkConnectionPool, NetworkPoolListener, ReferenceCountedNetworkConnection};
pub use registry::NetworkPoolRegistry;
