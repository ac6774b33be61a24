//! Queue descriptors and messages.

use uuid::Uuid;

use super::service::CasualBuffer;

/// Options for a queue operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueOptions {
    blocking: bool,
}

impl QueueOptions {
    /// Creates options with the given blocking mode.
    pub fn new(blocking: bool) -> Self {
        Self { blocking }
    }

    /// Returns true if a dequeue should wait for a message.
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }
}

/// Identifies a remote queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueInfo {
    queue_name: String,
    options: QueueOptions,
}

impl QueueInfo {
    /// Creates a non-blocking queue descriptor.
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self::with_options(queue_name, QueueOptions::default())
    }

    /// Creates a queue descriptor with explicit options.
    pub fn with_options(queue_name: impl Into<String>, options: QueueOptions) -> Self {
        Self {
            queue_name: queue_name.into(),
            options,
        }
    }

    /// Returns the queue name.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Returns the queue options.
    pub fn options(&self) -> QueueOptions {
        self.options
    }
}

/// Selects which message a dequeue returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageSelector {
    selector: String,
    selector_id: Uuid,
}

impl MessageSelector {
    /// Creates a selector matching on message properties.
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            selector_id: Uuid::nil(),
        }
    }

    /// Creates a selector matching a specific message id.
    pub fn of_id(selector_id: Uuid) -> Self {
        Self {
            selector: String::new(),
            selector_id,
        }
    }

    /// Returns the property selector.
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Returns the message id selector, nil when unused.
    pub fn selector_id(&self) -> Uuid {
        self.selector_id
    }
}

/// A message stored in or taken from a remote queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    id: Uuid,
    correlation_information: String,
    reply_queue: String,
    properties: String,
    redelivered_count: u64,
    payload: CasualBuffer,
}

impl QueueMessage {
    /// Creates a new message with a fresh id.
    pub fn new(payload: CasualBuffer) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_information: String::new(),
            reply_queue: String::new(),
            properties: String::new(),
            redelivered_count: 0,
            payload,
        }
    }

    /// Sets the message id.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Sets the correlation information.
    pub fn with_correlation_information(mut self, value: impl Into<String>) -> Self {
        self.correlation_information = value.into();
        self
    }

    /// Sets the reply queue.
    pub fn with_reply_queue(mut self, value: impl Into<String>) -> Self {
        self.reply_queue = value.into();
        self
    }

    /// Sets the message properties used by selectors.
    pub fn with_properties(mut self, value: impl Into<String>) -> Self {
        self.properties = value.into();
        self
    }

    /// Sets the redelivery count.
    pub fn with_redelivered_count(mut self, count: u64) -> Self {
        self.redelivered_count = count;
        self
    }

    /// Returns the message id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the correlation information.
    pub fn correlation_information(&self) -> &str {
        &self.correlation_information
    }

    /// Returns the reply queue.
    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    /// Returns the message properties.
    pub fn properties(&self) -> &str {
        &self.properties
    }

    /// Returns how many times the message has been redelivered.
    pub fn redelivered_count(&self) -> u64 {
        self.redelivered_count
    }

    /// Returns the payload.
    pub fn payload(&self) -> &CasualBuffer {
        &self.payload
    }
}
