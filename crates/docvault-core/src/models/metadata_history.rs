use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::{Actor, Metadata};

/// A superseded metadata value. Entries are never edited once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataHistoryEntry {
    pub id: i64,
    pub document_id: i64,
    pub metadata: Metadata,
    pub superseded_at: DateTime<Utc>,
    pub superseded_by: Actor,
}

/// History entry produced by the ledger, not yet assigned a surrogate id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub document_id: i64,
    pub metadata: Metadata,
    pub superseded_at: DateTime<Utc>,
    pub superseded_by: Actor,
}
