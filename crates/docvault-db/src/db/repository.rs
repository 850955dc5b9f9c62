//! Repository traits for documents
//!
//! Services depend on these traits only, so the same lifecycle code runs
//! against PostgreSQL in production and against memory in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docvault_core::models::{
    Actor, Document, DocumentType, Metadata, MetadataHistoryEntry, NewDocument, Page,
};
use docvault_core::{AppError, DocumentQuery};
use uuid::Uuid;

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Whether the UUID is bound to any document, soft-deleted included.
    async fn exists_any(&self, uuid: Uuid) -> Result<bool, AppError>;

    /// Look up an active document.
    async fn find_active(&self, uuid: Uuid) -> Result<Option<Document>, AppError>;

    /// Look up a document whether or not it is soft-deleted.
    async fn find_any(&self, uuid: Uuid) -> Result<Option<Document>, AppError>;

    /// Type of the document bound to the UUID, soft-deleted included.
    async fn type_of(&self, uuid: Uuid) -> Result<Option<DocumentType>, AppError>;

    /// Begin a unit of work for inserting a document.
    async fn begin(&self) -> Result<Box<dyn DocumentTransaction>, AppError>;

    /// Replace an active document's metadata, recording the value it held
    /// as a history entry in the same unit of work. The superseded value is
    /// read under the write lock. Returns `None` when the document is not
    /// active.
    async fn replace_metadata(
        &self,
        document_id: i64,
        metadata: Metadata,
        at: DateTime<Utc>,
        by: &Actor,
    ) -> Result<Option<Document>, AppError>;

    /// Set the deletion marker. Returns `false` when the document was not
    /// active.
    async fn mark_deleted(
        &self,
        document_id: i64,
        at: DateTime<Utc>,
        by: &Actor,
    ) -> Result<bool, AppError>;

    /// History of a document, most recent first.
    async fn history(&self, document_id: i64) -> Result<Vec<MetadataHistoryEntry>, AppError>;

    /// Run a search over active documents.
    async fn query(&self, query: &DocumentQuery) -> Result<Page<Document>, AppError>;
}

/// An open insert transaction. Dropping it without committing rolls back.
#[async_trait]
pub trait DocumentTransaction: Send {
    /// Insert a document row. A UUID that is already bound fails with
    /// `AppError::Conflict`.
    async fn insert(&mut self, document: NewDocument) -> Result<Document, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}
