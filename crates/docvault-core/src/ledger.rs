//! Metadata history ledger.

use chrono::{DateTime, Utc};

use crate::models::{Actor, Document, Metadata, NewHistoryEntry};

/// Snapshot the document's current metadata as a new most-recent history
/// entry, then install `new_metadata` as the current value.
///
/// The returned entry must be persisted together with the updated document.
pub fn append(
    document: &mut Document,
    new_metadata: Metadata,
    now: DateTime<Utc>,
    actor: &Actor,
) -> NewHistoryEntry {
    let superseded = std::mem::replace(&mut document.metadata, new_metadata);
    NewHistoryEntry {
        document_id: document.id,
        metadata: superseded,
        superseded_at: now,
        superseded_by: actor.clone(),
    }
}
