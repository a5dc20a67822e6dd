//! Controller configuration.
//!
//! Configuration is fixed at construction time. The only required field is
//! the chain name; the address family, tool binary path and host-entry TTL
//! all have defaults.
//!
//! ```yaml
//! chain: INPUT
//! family: 4
//! ttl_secs: 300
//! # tool_path: /usr/local/sbin/iptables
//! ```

mod loader;
mod types;

pub use types::{Config, ConfigError, Family};
