//! Caching controller for packet-filter chains.
//!
//! chainguard is a front-end over an iptables-style rule table. It tracks
//! the "jump to target" rules it has installed for individual hosts and
//! network interfaces in an in-memory desired-state store, and can
//! reconstruct the entire live chain from that store at any time by
//! flushing and re-appending every tracked rule.
//!
//! Host rules carry a time-to-live; when a lease lapses the entry is
//! removed by a background sweep and the chain is rebuilt. Interface rules
//! never expire.
//!
//! The controller assumes exclusive ownership of the configured chain. It
//! never reads the kernel's actual rules: the stores are the single source
//! of truth, and every removal is implemented as flush-then-reapply.
//!
//! # Example
//!
//! ```ignore
//! use chainguard::{Config, Controller};
//!
//! let config = Config::new("INPUT").with_ttl_secs(600);
//! let controller = Controller::with_system_executor(config)?;
//!
//! controller.add_host("203.0.113.7", "DROP").await?;
//! controller.add_interface("eth2", "ACCEPT").await?;
//!
//! // Later: removal triggers a full flush + re-render of the chain.
//! controller.remove_host("203.0.113.7").await?;
//! ```

pub mod config;
pub mod controller;
pub mod exec;
pub mod store;

pub use config::{Config, ConfigError, Family};
pub use controller::{Controller, Event, DEFAULT_TARGET};
pub use exec::{CommandExecutor, ExecError, SystemExecutor};
pub use store::{ExpiringStore, StoreEvent};
