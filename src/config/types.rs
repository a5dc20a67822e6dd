use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default host-entry TTL in seconds.
const DEFAULT_TTL_SECS: u64 = 300;

/// Configuration error.
///
/// Fatal at construction or parse time; a controller is never created from
/// an invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Chain name is missing or empty.
    #[error("chain name must not be empty")]
    EmptyChain,

    /// Address family is neither 4 nor 6.
    #[error("unrecognized address family: {0} (expected 4 or 6)")]
    InvalidFamily(u8),

    /// YAML parse error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// IP address family.
///
/// Selects the default tool binary and, implicitly, the rule syntax
/// dialect the external tool expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum Family {
    #[default]
    V4,
    V6,
}

impl TryFrom<u8> for Family {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Family::V4),
            6 => Ok(Family::V6),
            other => Err(ConfigError::InvalidFamily(other)),
        }
    }
}

impl Family {
    /// Well-known absolute path of the rule-table tool for this family.
    ///
    /// Used when no explicit `tool_path` is configured. Path search against
    /// the environment belongs to the caller; this crate only ever receives
    /// an already-resolved path.
    pub fn default_tool_path(&self) -> &'static Path {
        match self {
            Family::V4 => Path::new("/sbin/iptables"),
            Family::V6 => Path::new("/sbin/ip6tables"),
        }
    }
}

/// Controller configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Chain the controller owns (e.g. "INPUT", "FORWARD").
    pub chain: String,

    /// Address family (4 or 6).
    #[serde(default)]
    pub family: Family,

    /// Explicit path to the rule-table tool binary.
    ///
    /// Defaults to the family's well-known path.
    #[serde(default)]
    pub tool_path: Option<PathBuf>,

    /// Host-entry TTL in seconds. 0 disables expiry.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

impl Config {
    /// Create a configuration for the given chain with all defaults.
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
            family: Family::default(),
            tool_path: None,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    /// Set the address family.
    pub fn with_family(mut self, family: Family) -> Self {
        self.family = family;
        self
    }

    /// Set an explicit tool binary path.
    pub fn with_tool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool_path = Some(path.into());
        self
    }

    /// Set the host-entry TTL in seconds (0 disables expiry).
    pub fn with_ttl_secs(mut self, secs: u64) -> Self {
        self.ttl_secs = secs;
        self
    }

    /// Host-entry TTL, or `None` when expiry is disabled.
    pub fn ttl(&self) -> Option<Duration> {
        if self.ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.ttl_secs))
        }
    }

    /// Tool binary path: the explicit override, or the family default.
    pub fn effective_tool_path(&self) -> PathBuf {
        self.tool_path
            .clone()
            .unwrap_or_else(|| self.family.default_tool_path().to_path_buf())
    }
}
