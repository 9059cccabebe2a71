//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, persistence and timer sync into the rundown edit API.
//! - Keep transport layers decoupled from storage details.

pub mod import;
pub mod rundown_service;
