//! Rundown domain model.
//!
//! # Responsibility
//! - Define entry shapes, id generation and the ordered rundown store.
//! - Host the delay-application engine, which only reshapes store data.
//!
//! # Invariants
//! - Every entry is identified by a stable, unique `EntryId`.
//! - Sequence order alone defines delay propagation and now/next.

pub mod delay;
pub mod entry;
pub mod id;
pub mod rundown;
