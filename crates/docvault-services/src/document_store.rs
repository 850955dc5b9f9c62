//! Document lifecycle over a [`DocumentRepository`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use docvault_core::models::{
    Actor, Document, DocumentType, FileDescriptor, Metadata, MetadataHistoryEntry, NewDocument,
};
use docvault_core::AppError;
use docvault_db::DocumentRepository;
use uuid::Uuid;

#[derive(Clone)]
pub struct DocumentStore {
    repository: Arc<dyn DocumentRepository>,
}

impl DocumentStore {
    pub fn new(repository: Arc<dyn DocumentRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn DocumentRepository> {
        &self.repository
    }

    /// Fail with `Conflict` when the UUID is bound, soft-deleted included.
    pub async fn ensure_unbound(&self, uuid: Uuid) -> Result<(), AppError> {
        if self.repository.exists_any(uuid).await? {
            tracing::debug!(uuid = %uuid, "Document UUID already bound");
            return Err(AppError::Conflict(format!("Document {} already exists", uuid)));
        }
        Ok(())
    }

    pub fn new_document(
        document_type: DocumentType,
        uuid: Uuid,
        file: FileDescriptor,
        metadata: Metadata,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> NewDocument {
        NewDocument {
            uuid,
            document_type,
            file,
            metadata,
            created_at: now,
            created_by: actor.clone(),
        }
    }

    /// Persist a new document in its own transaction.
    pub async fn create(
        &self,
        document_type: DocumentType,
        uuid: Uuid,
        file: FileDescriptor,
        metadata: Metadata,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Document, AppError> {
        self.ensure_unbound(uuid).await?;

        let mut tx = self.repository.begin().await?;
        let document = tx
            .insert(Self::new_document(
                document_type,
                uuid,
                file,
                metadata,
                actor,
                now,
            ))
            .await?;
        tx.commit().await?;

        tracing::info!(uuid = %uuid, document_type = %document_type, "Document created");
        Ok(document)
    }

    pub async fn get(&self, uuid: Uuid) -> Result<Document, AppError> {
        self.repository
            .find_active(uuid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", uuid)))
    }

    /// Same lookup as [`get`](Self::get), reported as a missing file.
    pub async fn get_file_ref(&self, uuid: Uuid) -> Result<Document, AppError> {
        self.repository
            .find_active(uuid)
            .await?
            .ok_or_else(|| AppError::FileNotFound(format!("File for document {} not found", uuid)))
    }

    pub async fn replace_metadata(
        &self,
        uuid: Uuid,
        metadata: Metadata,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Document, AppError> {
        let current = self.get(uuid).await?;
        let document = self
            .repository
            .replace_metadata(current.id, metadata, now, actor)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", uuid)))?;

        tracing::info!(uuid = %uuid, "Document metadata replaced");
        Ok(document)
    }

    /// Soft-delete. Returns the deleted document, or `None` when nothing
    /// active was bound to the UUID.
    pub async fn soft_delete(
        &self,
        uuid: Uuid,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Option<Document>, AppError> {
        let Some(document) = self.repository.find_active(uuid).await? else {
            tracing::debug!(uuid = %uuid, "Delete of unknown or deleted document ignored");
            return Ok(None);
        };

        if !self.repository.mark_deleted(document.id, now, actor).await? {
            return Ok(None);
        }

        tracing::info!(uuid = %uuid, "Document soft-deleted");
        Ok(Some(document))
    }

    pub async fn history(&self, uuid: Uuid) -> Result<Vec<MetadataHistoryEntry>, AppError> {
        let document = self.get(uuid).await?;
        self.repository.history(document.id).await
    }

    pub async fn type_of(&self, uuid: Uuid) -> Result<Option<DocumentType>, AppError> {
        self.repository.type_of(uuid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docvault_db::InMemoryDocumentRepository;
    use serde_json::json;

    fn metadata(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    fn store() -> DocumentStore {
        DocumentStore::new(Arc::new(InMemoryDocumentRepository::new()))
    }

    fn actor() -> Actor {
        Actor::new("billing", Some("alice".to_string()))
    }

    async fn create(store: &DocumentStore, uuid: Uuid) -> Document {
        store
            .create(
                DocumentType::Invoice,
                uuid,
                FileDescriptor::new("inv.pdf", 3, "application/pdf"),
                metadata(json!({"v": "m1"})),
                &actor(),
                Utc::now(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_sets_created_at() {
        let store = store();
        let now = Utc::now();
        let uuid = Uuid::new_v4();
        let document = store
            .create(
                DocumentType::Invoice,
                uuid,
                FileDescriptor::new("inv.pdf", 3, "application/pdf"),
                Metadata::new(),
                &actor(),
                now,
            )
            .await
            .unwrap();

        assert_eq!(document.created_at, now);
        assert_eq!(document.created_by, actor());
        assert_eq!(document.file.file_hash, "");
        assert_eq!(store.get(uuid).await.unwrap().id, document.id);
    }

    #[tokio::test]
    async fn test_create_conflicts_even_after_delete() {
        let store = store();
        let uuid = Uuid::new_v4();
        create(&store, uuid).await;
        store.soft_delete(uuid, &actor(), Utc::now()).await.unwrap();

        let err = store
            .create(
                DocumentType::Invoice,
                uuid,
                FileDescriptor::new("inv.pdf", 3, "application/pdf"),
                Metadata::new(),
                &actor(),
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_missing_document_errors() {
        let store = store();
        let uuid = Uuid::new_v4();
        assert!(matches!(
            store.get(uuid).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            store.get_file_ref(uuid).await.unwrap_err(),
            AppError::FileNotFound(_)
        ));
        assert!(matches!(
            store
                .replace_metadata(uuid, Metadata::new(), &actor(), Utc::now())
                .await
                .unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_replace_metadata_builds_history() {
        let store = store();
        let uuid = Uuid::new_v4();
        create(&store, uuid).await;

        store
            .replace_metadata(uuid, metadata(json!({"v": "m2"})), &actor(), Utc::now())
            .await
            .unwrap();
        let history = store.history(uuid).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].metadata, metadata(json!({"v": "m1"})));

        let document = store
            .replace_metadata(uuid, metadata(json!({"v": "m3"})), &actor(), Utc::now())
            .await
            .unwrap();
        assert_eq!(document.metadata, metadata(json!({"v": "m3"})));

        let history: Vec<_> = store
            .history(uuid)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.metadata["v"].clone())
            .collect();
        assert_eq!(history, vec![json!("m2"), json!("m1")]);
    }

    #[tokio::test]
    async fn test_concurrent_replaces_each_snapshot_a_distinct_value() {
        let store = store();
        let uuid = Uuid::new_v4();
        create(&store, uuid).await;

        let actor = actor();
        let (a, b) = tokio::join!(
            store.replace_metadata(uuid, metadata(json!({"v": "m2"})), &actor, Utc::now()),
            store.replace_metadata(uuid, metadata(json!({"v": "m3"})), &actor, Utc::now()),
        );
        a.unwrap();
        b.unwrap();

        let current = store.get(uuid).await.unwrap().metadata["v"].clone();
        let mut seen: Vec<_> = store
            .history(uuid)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.metadata["v"].clone())
            .collect();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen.last(), Some(&json!("m1")));
        seen.push(current);
        seen.sort_by_key(|v| v.to_string());
        assert_eq!(seen, vec![json!("m1"), json!("m2"), json!("m3")]);
    }

    #[tokio::test]
    async fn test_replace_after_delete_is_not_found() {
        let store = store();
        let uuid = Uuid::new_v4();
        create(&store, uuid).await;
        store.soft_delete(uuid, &actor(), Utc::now()).await.unwrap();

        let err = store
            .replace_metadata(uuid, metadata(json!({"v": "m2"})), &actor(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_soft_delete_is_idempotent() {
        let store = store();
        let uuid = Uuid::new_v4();

        assert!(store
            .soft_delete(Uuid::new_v4(), &actor(), Utc::now())
            .await
            .unwrap()
            .is_none());

        create(&store, uuid).await;
        assert!(store
            .soft_delete(uuid, &actor(), Utc::now())
            .await
            .unwrap()
            .is_some());
        assert!(store
            .soft_delete(uuid, &actor(), Utc::now())
            .await
            .unwrap()
            .is_none());

        assert!(matches!(
            store.get(uuid).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert_eq!(
            store.type_of(uuid).await.unwrap(),
            Some(DocumentType::Invoice)
        );
    }
}
