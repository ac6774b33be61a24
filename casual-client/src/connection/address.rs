//! Logical address of a remote domain.

use std::fmt;
use std::str::FromStr;

use casual_core::CasualError;

/// A host and port pair, used as the pooling key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    /// Creates a new address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Address {
    type Err = CasualError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| CasualError::Configuration(format!("missing port in address: {s}")))?;

        if host.is_empty() {
            return Err(CasualError::Configuration(format!(
                "missing host in address: {s}"
            )));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| CasualError::Configuration(format!("invalid port in {s}: {e}")))?;

        Ok(Self::new(host, port))
    }
}
