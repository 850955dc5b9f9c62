use chrono::{DateTime, Utc};
use docvault_core::models::{
    Actor, Document, DocumentState, DocumentType, FileDescriptor, Metadata, MetadataHistoryEntry,
};
use docvault_core::AppError;
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the documents table.
#[derive(Debug, FromRow)]
pub struct DocumentRow {
    pub id: i64,
    pub uuid: Uuid,
    pub document_type: DocumentType,
    pub filename: String,
    pub file_extension: String,
    pub file_size: i64,
    pub file_hash: String,
    pub mime_type: String,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub created_by_service: String,
    pub created_by_username: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by_service: Option<String>,
    pub deleted_by_username: Option<String>,
}

/// Database row for the document_metadata_history table.
#[derive(Debug, FromRow)]
pub struct HistoryRow {
    pub id: i64,
    pub document_id: i64,
    pub metadata: JsonValue,
    pub superseded_at: DateTime<Utc>,
    pub superseded_by_service: String,
    pub superseded_by_username: Option<String>,
}

fn into_metadata(value: JsonValue, owner: &str) -> Result<Metadata, AppError> {
    match value {
        JsonValue::Object(map) => Ok(map),
        _ => Err(AppError::Internal(format!(
            "Stored metadata of {} is not a JSON object",
            owner
        ))),
    }
}

impl TryFrom<DocumentRow> for Document {
    type Error = AppError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let state = match (row.deleted_at, row.deleted_by_service) {
            (None, None) => DocumentState::Active,
            (Some(at), Some(service_name)) => DocumentState::Deleted {
                at,
                by: Actor::new(service_name, row.deleted_by_username),
            },
            _ => {
                return Err(AppError::Internal(format!(
                    "Document {} has an incomplete deletion marker",
                    row.uuid
                )))
            }
        };

        Ok(Document {
            id: row.id,
            uuid: row.uuid,
            document_type: row.document_type,
            file: FileDescriptor {
                filename: row.filename,
                file_extension: row.file_extension,
                file_size: row.file_size,
                file_hash: row.file_hash,
                mime_type: row.mime_type,
            },
            metadata: into_metadata(row.metadata, &row.uuid.to_string())?,
            created_at: row.created_at,
            created_by: Actor::new(row.created_by_service, row.created_by_username),
            state,
        })
    }
}

impl TryFrom<HistoryRow> for MetadataHistoryEntry {
    type Error = AppError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(MetadataHistoryEntry {
            id: row.id,
            document_id: row.document_id,
            metadata: into_metadata(row.metadata, &format!("history entry {}", row.id))?,
            superseded_at: row.superseded_at,
            superseded_by: Actor::new(row.superseded_by_service, row.superseded_by_username),
        })
    }
}

pub fn rows_to_documents(rows: Vec<DocumentRow>) -> Result<Vec<Document>, AppError> {
    rows.into_iter().map(Document::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> DocumentRow {
        DocumentRow {
            id: 1,
            uuid: Uuid::new_v4(),
            document_type: DocumentType::Invoice,
            filename: "inv.pdf".to_string(),
            file_extension: "pdf".to_string(),
            file_size: 12,
            file_hash: String::new(),
            mime_type: "application/pdf".to_string(),
            metadata: json!({"customer": "acme"}),
            created_at: Utc::now(),
            created_by_service: "billing".to_string(),
            created_by_username: None,
            deleted_at: None,
            deleted_by_service: None,
            deleted_by_username: None,
        }
    }

    #[test]
    fn test_active_row() {
        let document = Document::try_from(row()).unwrap();
        assert!(document.is_active());
        assert_eq!(document.metadata["customer"], "acme");
    }

    #[test]
    fn test_deleted_row() {
        let mut r = row();
        r.deleted_at = Some(Utc::now());
        r.deleted_by_service = Some("billing".to_string());
        r.deleted_by_username = Some("bob".to_string());

        let document = Document::try_from(r).unwrap();
        match document.state {
            DocumentState::Deleted { by, .. } => {
                assert_eq!(by.username.as_deref(), Some("bob"));
            }
            DocumentState::Active => panic!("expected deleted state"),
        }
    }

    #[test]
    fn test_incomplete_marker_rejected() {
        let mut r = row();
        r.deleted_at = Some(Utc::now());
        assert!(Document::try_from(r).is_err());
    }

    #[test]
    fn test_non_object_metadata_rejected() {
        let mut r = row();
        r.metadata = json!([1, 2]);
        assert!(Document::try_from(r).is_err());
    }
}
