//! Error types for casual operations.

use std::io;
use thiserror::Error;

use crate::protocol::{ErrorState, XaReturnCode};

/// The main error type for casual operations.
#[derive(Debug, Error)]
pub enum CasualError {
    /// Connection-related errors (network failures, disconnections).
    #[error("connection error: {0}")]
    Connection(String),

    /// Protocol-related errors (unexpected replies, malformed messages).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// XA-class failure carrying the standard XA code.
    #[error("XA error: {0}")]
    Xa(XaReturnCode),

    /// Failure inside a transaction-scoped unit of work.
    #[error("transaction error: {message}")]
    Transaction {
        /// What went wrong at the transaction level.
        message: String,
        /// The failure that triggered the transaction error.
        #[source]
        source: Option<Box<CasualError>>,
    },

    /// The remote service executed but reported failure.
    #[error("service call failed: {service} returned {error}")]
    ServiceCallFailed {
        /// The called service.
        service: String,
        /// The remote error state.
        error: ErrorState,
    },

    /// The remote queue operation reported failure.
    #[error("queue operation failed: {operation} on {queue} returned {error}")]
    QueueOperationFailed {
        /// `enqueue` or `dequeue`.
        operation: &'static str,
        /// The queue name.
        queue: String,
        /// The remote error state.
        error: ErrorState,
    },

    /// A pool is already at its maximum size.
    #[error("already at max pool size: {size} for pool: {pool}")]
    CapacityExceeded {
        /// The pool identifier.
        pool: String,
        /// The configured maximum size.
        size: usize,
    },

    /// A pool was asked for a connection to an address it does not serve.
    #[error("address mismatch, have: {expected} got: {actual}")]
    AddressMismatch {
        /// The address the pool serves.
        expected: String,
        /// The address that was requested.
        actual: String,
    },

    /// Configuration errors (invalid settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CasualError {
    /// Creates a transaction error wrapping `source`.
    pub fn transaction(message: impl Into<String>, source: CasualError) -> Self {
        Self::Transaction {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the innermost error of a transaction error chain.
    pub fn root_cause(&self) -> &CasualError {
        let mut current = self;
        while let Self::Transaction {
            source: Some(source),
            ..
        } = current
        {
            current = source;
        }
        current
    }

    /// Returns the XA code carried by this error or its transaction source chain.
    pub fn xa_code(&self) -> Option<XaReturnCode> {
        match self.root_cause() {
            Self::Xa(code) => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this error is a transport level failure.
    pub fn is_connection(&self) -> bool {
        matches!(self.root_cause(), Self::Connection(_) | Self::Io(_))
    }
}

/// A specialized `Result` type for casual operations.
pub type Result<T> = std::result::Result<T, CasualError>;
