//! Entry identifier generation.
//!
//! The generator is pure and stateless. Collision handling against the live
//! rundown belongs to the store.

use crate::model::entry::EntryId;
use uuid::Uuid;

/// Returns a new random entry id (uuid v4, hyphen-less lowercase hex).
pub fn generate_id() -> EntryId {
    Uuid::new_v4().simple().to_string()
}
