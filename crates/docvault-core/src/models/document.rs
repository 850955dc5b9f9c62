use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document_type::DocumentType;

/// Free-form document metadata. Always a JSON object.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Who performed an operation: the calling service and, optionally, the end
/// user it acted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Actor {
    pub fn new(service_name: impl Into<String>, username: Option<String>) -> Self {
        Self {
            service_name: service_name.into(),
            username,
        }
    }
}

/// Lifecycle state of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentState {
    Active,
    Deleted { at: DateTime<Utc>, by: Actor },
}

impl DocumentState {
    pub fn is_active(&self) -> bool {
        matches!(self, DocumentState::Active)
    }
}

/// Description of the stored file. The bytes themselves live in object
/// storage under the document UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub filename: String,
    pub file_extension: String,
    pub file_size: i64,
    /// No hashing algorithm is applied; always empty.
    pub file_hash: String,
    pub mime_type: String,
}

impl FileDescriptor {
    /// Build a descriptor from a sanitized filename, deriving the extension.
    pub fn new(filename: impl Into<String>, file_size: i64, mime_type: impl Into<String>) -> Self {
        let filename = filename.into();
        let file_extension = extension_of(&filename);
        Self {
            filename,
            file_extension,
            file_size,
            file_hash: String::new(),
            mime_type: mime_type.into(),
        }
    }
}

/// Lower-cased extension after the last dot, or empty when there is none.
pub fn extension_of(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Surrogate key assigned by the store
    pub id: i64,
    pub uuid: Uuid,
    pub document_type: DocumentType,
    #[serde(flatten)]
    pub file: FileDescriptor,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub created_by: Actor,
    pub state: DocumentState,
}

impl Document {
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Bucket holding this document's bytes.
    pub fn bucket(&self) -> &'static str {
        self.document_type.bucket()
    }

    /// Object key of this document's bytes.
    pub fn storage_key(&self) -> String {
        self.uuid.to_string()
    }
}

/// Input for inserting a document row.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub uuid: Uuid,
    pub document_type: DocumentType,
    pub file: FileDescriptor,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub created_by: Actor,
}
