//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the persistence-provider contract the rundown service depends on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod rundown_repo;
