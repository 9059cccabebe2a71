//! Timer synchronization.
//!
//! # Responsibility
//! - Model the playback cursor the core reads (never writes).
//! - Decide after each mutation whether the live timer must reload.
//! - Define the timer collaborator the decision is delegated to.

pub mod cursor;
pub mod decider;
pub mod timer;
