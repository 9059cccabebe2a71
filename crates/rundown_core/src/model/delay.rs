//! Delay application.
//!
//! Folds a `delay` entry's duration into every following event up to the next
//! `block` (or the end of the rundown), then removes the consumed delay and
//! the terminating block.
//!
//! # Invariants
//! - Consumed entries are removed by id after propagation, never by offset.
//! - Every shifted event gets exactly one `revision` bump, even for a zero
//!   duration.
//! - Other delays met during propagation are passed over unchanged.

use crate::model::entry::{Entry, EntryKind};
use crate::model::rundown::{AffectedIds, Rundown, StoreError, StoreResult};

/// Applies the delay with `delay_id` to `rundown`.
///
/// Reports the shifted event ids plus the removed delay and block ids.
///
/// # Errors
/// - `NotFound` when `delay_id` is absent.
/// - `InvalidEntryType` when `delay_id` is not a delay.
pub fn apply_delay(rundown: &mut Rundown, delay_id: &str) -> StoreResult<AffectedIds> {
    let start = rundown
        .position(delay_id)
        .ok_or_else(|| StoreError::NotFound(delay_id.to_string()))?;

    let delay_value = match &rundown.entries()[start] {
        Entry::Delay(delay) => delay.duration,
        other => {
            return Err(StoreError::InvalidEntryType {
                id: delay_id.to_string(),
                expected: EntryKind::Delay,
                actual: other.kind(),
            })
        }
    };

    let mut entries = rundown.entries().to_vec();
    let mut affected = Vec::new();
    let mut block_id = None;

    for entry in entries.iter_mut().skip(start + 1) {
        match entry {
            Entry::Event(event) => {
                event.shift(delay_value);
                affected.push(event.id.clone());
            }
            Entry::Block(block) => {
                block_id = Some(block.id.clone());
                break;
            }
            Entry::Delay(_) => {}
        }
    }

    entries.retain(|entry| entry.id() != delay_id && Some(entry.id()) != block_id.as_deref());
    affected.push(delay_id.to_string());
    affected.extend(block_id);

    rundown.replace_all(entries)?;
    Ok(AffectedIds::Ids(affected))
}
