//! Fanline Common - Shared types for the monetization core
//!
//! This crate provides the primitives every other Fanline crate builds on:
//! - Integer-cent money arithmetic with a single rounding policy
//! - User and event identifiers
//! - An injectable key-value state store (the swap point for moving
//!   per-user quota state into a distributed cache)
//! - Platform capability configuration resolved once at startup

#![warn(missing_docs)]

pub mod capabilities;
pub mod kv;
pub mod money;

pub use capabilities::Capabilities;
pub use kv::{KeyValueStore, MemoryStore};
pub use money::{share_of, Cents};

/// Platform user identifier (creators, fans, and referrers alike)
pub type UserId = uuid::Uuid;

/// Externally-assigned payment event identifier (Stripe `evt_…`)
pub type EventId = String;
