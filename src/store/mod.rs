//! Desired-state storage.
//!
//! [`ExpiringStore`] is the primitive both rule tables are built on: an
//! insertion-ordered map from key to value with an optional per-entry
//! time-to-live. The controller runs two instances: one with a finite TTL
//! for host rules, one that never expires for interface rules.
//!
//! Expiry is decided at read time against a monotonic clock; the periodic
//! background sweep only performs cleanup and emits [`StoreEvent`]
//! notifications. `contains`/`get`/`entries` are therefore correct even
//! between sweeps.

mod expiring;

pub use expiring::ExpiringStore;

/// Notification emitted by a store's background sweep.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// An entry's TTL lapsed and it was removed.
    Expired {
        /// Key of the removed entry.
        key: String,
    },
    /// The sweep hit an internal fault. The store keeps running.
    Fault(String),
}
