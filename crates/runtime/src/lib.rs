//! The glimpse runtime.
//!
//! [`Companion`] is the outward boundary: submit queries, subscribe to their
//! streams, inspect and manage memory, and start or stop the producers.

pub mod companion;

pub use companion::{memory_policy, Companion, CompanionBuilder};
