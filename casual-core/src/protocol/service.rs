//! Service buffers and service descriptors.

use std::time::Duration;

use bytes::Bytes;

/// A typed payload exchanged with a remote service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CasualBuffer {
    buffer_type: String,
    payload: Vec<Bytes>,
}

impl CasualBuffer {
    /// Creates a buffer of the given type.
    pub fn new(buffer_type: impl Into<String>, payload: Vec<Bytes>) -> Self {
        Self {
            buffer_type: buffer_type.into(),
            payload,
        }
    }

    /// Creates an `X_OCTET` buffer holding a single payload.
    pub fn octet(payload: impl Into<Bytes>) -> Self {
        Self::new("X_OCTET/", vec![payload.into()])
    }

    /// Returns the buffer type.
    pub fn buffer_type(&self) -> &str {
        &self.buffer_type
    }

    /// Returns the payload segments.
    pub fn payload(&self) -> &[Bytes] {
        &self.payload
    }

    /// Consumes the buffer and returns its payload segments.
    pub fn into_payload(self) -> Vec<Bytes> {
        self.payload
    }
}

/// How a remote service takes part in the caller's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionType {
    /// Join the caller's transaction if there is one, otherwise start one.
    #[default]
    Automatic,
    /// Join the caller's transaction if there is one.
    Join,
    /// Always start a new transaction.
    Atomic,
    /// Never take part in a transaction.
    None,
    /// Start a new branch of the caller's transaction.
    Branch,
}

/// A service as advertised by a remote domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDetails {
    name: String,
    category: String,
    transaction_type: TransactionType,
    timeout: Duration,
    hops: u16,
}

impl ServiceDetails {
    /// Creates a service descriptor.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        transaction_type: TransactionType,
        timeout: Duration,
        hops: u16,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            transaction_type,
            timeout,
            hops,
        }
    }

    /// Returns the service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the service category.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the transaction type.
    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    /// Returns the service timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the number of domain hops to the service.
    pub fn hops(&self) -> u16 {
        self.hops
    }
}
