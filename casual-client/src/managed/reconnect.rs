//! Staggered backoff and the reconnect loop driven by it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::instrument;

use crate::caller::{Caller, CallerProducer};
use crate::config::ReconnectConfig;
use crate::connection::{Address, NetworkListener};

/// Default upper bound used by [`StaggeredOptions::of`].
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// Generates reconnect delays.
///
/// The first call to [`next`](Self::next) yields the initial delay, the
/// second the subsequent delay, and every later call the previous delay
/// multiplied by the stagger factor. Every delay is clamped to the maximum.
#[derive(Debug, Clone)]
pub struct StaggeredOptions {
    initial: Duration,
    subsequent: Duration,
    factor: u32,
    max: Duration,
    current: Option<Duration>,
    calls: u32,
}

impl StaggeredOptions {
    /// Creates a schedule capped at five minutes. A factor of 0 is treated as 1.
    pub fn of(initial: Duration, subsequent: Duration, factor: u32) -> Self {
        Self::with_max(initial, subsequent, factor, DEFAULT_MAX_DELAY)
    }

    /// Creates a schedule with an explicit cap.
    pub fn with_max(initial: Duration, subsequent: Duration, factor: u32, max: Duration) -> Self {
        Self {
            initial,
            subsequent,
            factor: factor.max(1),
            max,
            current: None,
            calls: 0,
        }
    }

    /// Creates a schedule from reconnect settings.
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::with_max(
            config.initial_delay(),
            config.subsequent_delay(),
            config.stagger_factor(),
            config.max_delay(),
        )
    }

    /// Returns the next delay and advances the schedule.
    pub fn next(&mut self) -> Duration {
        let delay = match (self.calls, self.current) {
            (0, _) | (_, None) => self.initial,
            (1, _) => self.subsequent,
            (_, Some(previous)) => previous.saturating_mul(self.factor),
        };
        let delay = delay.min(self.max);
        self.calls = self.calls.saturating_add(1);
        self.current = Some(delay);
        delay
    }

    /// Restarts the schedule from the initial delay.
    pub fn reset(&mut self) {
        self.current = None;
        self.calls = 0;
    }
}

/// Something that can take over a freshly created caller.
pub trait Reconnectable: Send + Sync {
    /// Installs `caller` after a successful reconnect.
    fn set_caller(&self, caller: Arc<Caller>);

    /// Called before each reconnect attempt sleeps for `next_delay`.
    fn reconnect_attempt(&self, _attempt: u32, _next_delay: Duration) {}
}

/// Retries caller creation on a staggered schedule until it succeeds.
///
/// There is no retry limit. The loop only gives up when the target it
/// reconnects for has been dropped.
pub struct AutoReconnect {
    address: Address,
    producer: Arc<dyn CallerProducer>,
    listener: Arc<dyn NetworkListener>,
    options: StaggeredOptions,
}

impl AutoReconnect {
    /// Creates a reconnect loop for `address`. New callers report
    /// disconnects to `listener`.
    pub fn new(
        address: Address,
        producer: Arc<dyn CallerProducer>,
        listener: Arc<dyn NetworkListener>,
        options: StaggeredOptions,
    ) -> Self {
        Self {
            address,
            producer,
            listener,
            options,
        }
    }

    /// Runs until a caller has been installed into `target`.
    ///
    /// Returns false if `target` was dropped before that happened.
    #[instrument(
        name = "auto_reconnect.run",
        skip_all,
        fields(address = %self.address)
    )]
    pub async fn run<R>(mut self, target: Weak<R>) -> bool
    where
        R: Reconnectable + ?Sized,
    {
        let mut attempt = 0u32;

        loop {
            attempt = attempt.saturating_add(1);
            let delay = self.options.next();

            match target.upgrade() {
                Some(target) => target.reconnect_attempt(attempt, delay),
                None => {
                    tracing::debug!("reconnect target dropped");
                    return false;
                }
            }

            tracing::debug!(attempt = attempt, delay = ?delay, "scheduling reconnect");
            tokio::time::sleep(delay).await;

            let Some(target) = target.upgrade() else {
                tracing::debug!("reconnect target dropped");
                return false;
            };

            match self
                .producer
                .create_caller(&self.address, Arc::clone(&self.listener))
                .await
            {
                Ok(caller) => {
                    tracing::info!(attempt = attempt, "reconnect successful");
                    target.set_caller(caller);
                    return true;
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt, error = %e, "reconnect attempt failed");
                }
            }
        }
    }
}

impl std::fmt::Debug for AutoReconnect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoReconnect")
            .field("address", &self.address)
            .field("options", &self.options)
            .finish()
    }
}
