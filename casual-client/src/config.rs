//! Client configuration types and builders.

use std::time::Duration;

use casual_core::{CasualError, ProtocolVersion};
use uuid::Uuid;

/// Environment variable naming this client's domain.
pub const DOMAIN_NAME_ENV: &str = "DOMAIN_NAME";
/// Prefix of the generated domain name when none is configured.
const DEFAULT_DOMAIN_NAME_PREFIX: &str = "RUST-CASUAL-CLIENT-";
/// Default resource manager id reported to the remote coordinator.
pub(crate) const DEFAULT_RESOURCE_MANAGER_ID: i32 = 42;
/// Default delay before the first reconnect attempt.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);
/// Default delay before the second reconnect attempt.
const DEFAULT_SUBSEQUENT_DELAY: Duration = Duration::from_millis(1000);
/// Default multiplier applied to each later reconnect delay.
const DEFAULT_STAGGER_FACTOR: u32 = 2;
/// Default upper bound on a reconnect delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);
/// Default number of managed connections per address.
const DEFAULT_MANAGED_POOL_SIZE: usize = 1000;
/// Default number of transports per network pool.
const DEFAULT_NETWORK_POOL_SIZE: usize = 1;

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for CasualError {
    fn from(err: ConfigError) -> Self {
        CasualError::Configuration(err.message)
    }
}

/// Identifies this client towards the remote domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    id: Uuid,
    name: String,
}

impl DomainConfig {
    /// Returns the domain id sent in discovery requests.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the domain name sent in discovery requests.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: default_domain_name(),
        }
    }
}

fn default_domain_name() -> String {
    match std::env::var(DOMAIN_NAME_ENV) {
        Ok(name) if !name.is_empty() => name,
        _ => format!("{}{}", DEFAULT_DOMAIN_NAME_PREFIX, Uuid::new_v4()),
    }
}

/// Builder for `DomainConfig`.
#[derive(Debug, Clone, Default)]
pub struct DomainConfigBuilder {
    id: Option<Uuid>,
    name: Option<String>,
}

impl DomainConfigBuilder {
    /// Creates a new domain configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the domain id.
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the domain name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the domain configuration.
    ///
    /// Without an explicit name, the `DOMAIN_NAME` environment variable is
    /// used, falling back to a generated name.
    pub fn build(self) -> Result<DomainConfig, ConfigError> {
        let name = self.name.unwrap_or_else(default_domain_name);
        if name.is_empty() {
            return Err(ConfigError::new("domain name must not be empty"));
        }

        Ok(DomainConfig {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            name,
        })
    }
}

/// Reconnect backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    initial_delay: Duration,
    subsequent_delay: Duration,
    stagger_factor: u32,
    max_delay: Duration,
}

impl ReconnectConfig {
    /// Returns the delay before the first attempt.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Returns the delay before the second attempt.
    pub fn subsequent_delay(&self) -> Duration {
        self.subsequent_delay
    }

    /// Returns the factor each later delay is multiplied by.
    pub fn stagger_factor(&self) -> u32 {
        self.stagger_factor
    }

    /// Returns the upper bound on any delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            subsequent_delay: DEFAULT_SUBSEQUENT_DELAY,
            stagger_factor: DEFAULT_STAGGER_FACTOR,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// Builder for `ReconnectConfig`.
#[derive(Debug, Clone, Default)]
pub struct ReconnectConfigBuilder {
    initial_delay: Option<Duration>,
    subsequent_delay: Option<Duration>,
    stagger_factor: Option<u32>,
    max_delay: Option<Duration>,
}

impl ReconnectConfigBuilder {
    /// Creates a new reconnect configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay before the first attempt.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Sets the delay before the second attempt.
    pub fn subsequent_delay(mut self, delay: Duration) -> Self {
        self.subsequent_delay = Some(delay);
        self
    }

    /// Sets the stagger factor.
    pub fn stagger_factor(mut self, factor: u32) -> Self {
        self.stagger_factor = Some(factor);
        self
    }

    /// Sets the maximum delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Builds the reconnect configuration, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `stagger_factor` is zero
    /// - `initial_delay` or `subsequent_delay` exceeds `max_delay`
    pub fn build(self) -> Result<ReconnectConfig, ConfigError> {
        let initial_delay = self.initial_delay.unwrap_or(DEFAULT_INITIAL_DELAY);
        let subsequent_delay = self.subsequent_delay.unwrap_or(DEFAULT_SUBSEQUENT_DELAY);
        let stagger_factor = self.stagger_factor.unwrap_or(DEFAULT_STAGGER_FACTOR);
        let max_delay = self.max_delay.unwrap_or(DEFAULT_MAX_DELAY);

        if stagger_factor == 0 {
            return Err(ConfigError::new("stagger_factor must be greater than 0"));
        }

        if initial_delay > max_delay {
            return Err(ConfigError::new("initial_delay must not exceed max_delay"));
        }

        if subsequent_delay > max_delay {
            return Err(ConfigError::new(
                "subsequent_delay must not exceed max_delay",
            ));
        }

        Ok(ReconnectConfig {
            initial_delay,
            subsequent_delay,
            stagger_factor,
            max_delay,
        })
    }
}

/// Pool sizing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    managed_pool_size: usize,
    network_pool_size: usize,
}

impl PoolConfig {
    /// Returns the maximum number of managed connections per address.
    pub fn managed_pool_size(&self) -> usize {
        self.managed_pool_size
    }

    /// Returns the maximum number of distinct transports per network pool.
    pub fn network_pool_size(&self) -> usize {
        self.network_pool_size
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            managed_pool_size: DEFAULT_MANAGED_POOL_SIZE,
            network_pool_size: DEFAULT_NETWORK_POOL_SIZE,
        }
    }
}

/// Builder for `PoolConfig`.
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    managed_pool_size: Option<usize>,
    network_pool_size: Option<usize>,
}

impl PoolConfigBuilder {
    /// Creates a new pool configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the managed connection pool size.
    pub fn managed_pool_size(mut self, size: usize) -> Self {
        self.managed_pool_size = Some(size);
        self
    }

    /// Sets the network pool size.
    pub fn network_pool_size(mut self, size: usize) -> Self {
        self.network_pool_size = Some(size);
        self
    }

    /// Builds the pool configuration, returning an error if a size is zero.
    pub fn build(self) -> Result<PoolConfig, ConfigError> {
        let managed_pool_size = self.managed_pool_size.unwrap_or(DEFAULT_MANAGED_POOL_SIZE);
        let network_pool_size = self.network_pool_size.unwrap_or(DEFAULT_NETWORK_POOL_SIZE);

        if managed_pool_size == 0 {
            return Err(ConfigError::new("managed_pool_size must be greater than 0"));
        }

        if network_pool_size == 0 {
            return Err(ConfigError::new("network_pool_size must be greater than 0"));
        }

        Ok(PoolConfig {
            managed_pool_size,
            network_pool_size,
        })
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    domain: DomainConfig,
    resource_manager_id: i32,
    protocol_version: ProtocolVersion,
    reconnect: ReconnectConfig,
    pool: PoolConfig,
}

impl ClientConfig {
    /// Creates a new client configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the domain configuration.
    pub fn domain(&self) -> &DomainConfig {
        &self.domain
    }

    /// Returns the resource manager id.
    pub fn resource_manager_id(&self) -> i32 {
        self.resource_manager_id
    }

    /// Returns the protocol version.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    /// Returns the reconnect configuration.
    pub fn reconnect(&self) -> &ReconnectConfig {
        &self.reconnect
    }

    /// Returns the pool configuration.
    pub fn pool(&self) -> &PoolConfig {
        &self.pool
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            domain: DomainConfig::default(),
            resource_manager_id: DEFAULT_RESOURCE_MANAGER_ID,
            protocol_version: ProtocolVersion::default(),
            reconnect: ReconnectConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    domain: DomainConfigBuilder,
    resource_manager_id: Option<i32>,
    protocol_version: Option<ProtocolVersion>,
    reconnect: ReconnectConfigBuilder,
    pool: PoolConfigBuilder,
}

impl ClientConfigBuilder {
    /// Creates a new client configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the domain identity using a builder function.
    pub fn domain<F>(mut self, f: F) -> Self
    where
        F: FnOnce(DomainConfigBuilder) -> DomainConfigBuilder,
    {
        self.domain = f(self.domain);
        self
    }

    /// Sets the domain name.
    pub fn domain_name(mut self, name: impl Into<String>) -> Self {
        self.domain = self.domain.name(name);
        self
    }

    /// Sets the resource manager id.
    pub fn resource_manager_id(mut self, id: i32) -> Self {
        self.resource_manager_id = Some(id);
        self
    }

    /// Sets the protocol version.
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = Some(version);
        self
    }

    /// Configures reconnect settings using a builder function.
    pub fn reconnect<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ReconnectConfigBuilder) -> ReconnectConfigBuilder,
    {
        self.reconnect = f(self.reconnect);
        self
    }

    /// Configures pool settings using a builder function.
    pub fn pool<F>(mut self, f: F) -> Self
    where
        F: FnOnce(PoolConfigBuilder) -> PoolConfigBuilder,
    {
        self.pool = f(self.pool);
        self
    }

    /// Builds the client configuration, returning an error if validation fails.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        Ok(ClientConfig {
            domain: self.domain.build()?,
            resource_manager_id: self
                .resource_manager_id
                .unwrap_or(DEFAULT_RESOURCE_MANAGER_ID),
            protocol_version: self.protocol_version.unwrap_or_default(),
            reconnect: self.reconnect.build()?,
            pool: self.pool.build()?,
        })
    }
}
