//! Rule-table controller.
//!
//! Owns the two desired-state stores (hosts with TTL, interfaces without),
//! renders them into rule-table commands and keeps the live chain
//! consistent with the stores.
//!
//! The live chain is always derivable from store state: one
//! `-s host -j target` rule per host entry in insertion order, followed by
//! one `-i iface -j target` rule per interface entry in insertion order.
//! Removal never deletes an individual live rule (the controller does not
//! track rule positions); it removes the store entry and rebuilds the
//! whole chain with flush-then-reapply.

mod controller;
mod rules;

pub use controller::{Controller, Event, DEFAULT_TARGET};
