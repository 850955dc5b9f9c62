//! Request-level entry points
//!
//! Every operation works out which document types the caller may touch,
//! resolves the effective type of the request (a stored UUID's type beats the
//! literal one), and authorizes it before any state is read or changed.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use docvault_core::authorization::{authorize, authorized_types, resolve_type};
use docvault_core::models::{
    Document, DocumentType, MetadataHistoryEntry, Page, SearchRequest,
};
use docvault_core::validation::{metadata_from_value, sanitize_filename};
use docvault_core::{AppError, Clock, DocumentEvent, DocumentEventSink, RequestContext};
use docvault_storage::ObjectStorage;
use uuid::Uuid;
use validator::Validate;

use crate::document_store::DocumentStore;
use crate::search::SearchEngine;
use crate::upload::{UploadOrchestrator, UploadedFile};

#[derive(Clone)]
pub struct DocumentService {
    store: DocumentStore,
    storage: Arc<dyn ObjectStorage>,
    uploads: UploadOrchestrator,
    search: SearchEngine,
    events: Arc<dyn DocumentEventSink>,
    clock: Arc<dyn Clock>,
}

impl DocumentService {
    pub fn new(
        store: DocumentStore,
        storage: Arc<dyn ObjectStorage>,
        uploads: UploadOrchestrator,
        search: SearchEngine,
        events: Arc<dyn DocumentEventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            storage,
            uploads,
            search,
            events,
            clock,
        }
    }

    /// Resolve the request's type and check the caller may act on it.
    async fn authorize_request(
        &self,
        context: &RequestContext,
        uuid: Option<Uuid>,
        literal: Option<DocumentType>,
    ) -> Result<BTreeSet<DocumentType>, AppError> {
        let authorized = authorized_types(&context.role_grants);
        let resolved = resolve_type(uuid, literal, |u| self.store.type_of(u)).await?;
        authorize(resolved, &authorized)?;
        Ok(authorized)
    }

    pub async fn upload(
        &self,
        context: &RequestContext,
        document_type: DocumentType,
        uuid: Uuid,
        file: UploadedFile,
        metadata: serde_json::Value,
    ) -> Result<Document, AppError> {
        self.authorize_request(context, Some(uuid), Some(document_type))
            .await?;

        let metadata = metadata_from_value(metadata)?;
        let file = UploadedFile {
            filename: sanitize_filename(&file.filename)?,
            ..file
        };

        self.uploads
            .upload(
                document_type,
                uuid,
                file,
                metadata,
                context,
                self.clock.now(),
            )
            .await
    }

    pub async fn get(&self, context: &RequestContext, uuid: Uuid) -> Result<Document, AppError> {
        self.authorize_request(context, Some(uuid), None).await?;
        self.store.get(uuid).await
    }

    /// Document and its bytes.
    pub async fn download(
        &self,
        context: &RequestContext,
        uuid: Uuid,
    ) -> Result<(Document, Bytes), AppError> {
        self.authorize_request(context, Some(uuid), None).await?;
        let document = self.store.get_file_ref(uuid).await?;

        let content = self
            .storage
            .get(document.bucket(), &document.storage_key())
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    uuid = %uuid,
                    bucket = %document.bucket(),
                    "Document bytes unavailable"
                );
                AppError::from(e)
            })?;

        Ok((document, content))
    }

    pub async fn replace_metadata(
        &self,
        context: &RequestContext,
        uuid: Uuid,
        metadata: serde_json::Value,
    ) -> Result<Document, AppError> {
        self.authorize_request(context, Some(uuid), None).await?;
        let metadata = metadata_from_value(metadata)?;

        let now = self.clock.now();
        let document = self
            .store
            .replace_metadata(uuid, metadata, &context.actor(), now)
            .await?;

        self.events
            .emit(
                DocumentEvent::MetadataReplaced {
                    uuid,
                    document_type: document.document_type,
                },
                context,
                now,
            )
            .await;

        Ok(document)
    }

    /// Soft-delete. Unknown and already-deleted UUIDs succeed silently.
    pub async fn delete(&self, context: &RequestContext, uuid: Uuid) -> Result<(), AppError> {
        self.authorize_request(context, Some(uuid), None).await?;

        let now = self.clock.now();
        if let Some(document) = self.store.soft_delete(uuid, &context.actor(), now).await? {
            self.events
                .emit(
                    DocumentEvent::Deleted {
                        uuid,
                        document_type: document.document_type,
                    },
                    context,
                    now,
                )
                .await;
        }
        Ok(())
    }

    pub async fn history(
        &self,
        context: &RequestContext,
        uuid: Uuid,
    ) -> Result<Vec<MetadataHistoryEntry>, AppError> {
        self.authorize_request(context, Some(uuid), None).await?;
        self.store.history(uuid).await
    }

    pub async fn search(
        &self,
        context: &RequestContext,
        request: &SearchRequest,
    ) -> Result<Page<Document>, AppError> {
        request.validate()?;
        if !request.has_criteria() {
            return Err(AppError::Validation(
                "Search requires a document type or at least one metadata filter".to_string(),
            ));
        }
        request.metadata_filter()?;

        let authorized = self
            .authorize_request(context, None, request.document_type)
            .await?;
        self.search.search(request, &authorized).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clamav::tests::scanning_client;
    use chrono::{TimeZone, Utc};
    use docvault_core::models::{ROLE_MEDICAL, ROLE_SENSITIVE};
    use docvault_core::{FixedClock, NoOpEventSink};
    use docvault_db::InMemoryDocumentRepository;
    use docvault_storage::InMemoryStorage;
    use serde_json::json;

    struct Fixture {
        storage: InMemoryStorage,
        service: DocumentService,
    }

    fn fixture(scans: usize) -> Fixture {
        fixture_replying("stream: OK\0", scans)
    }

    fn fixture_replying(reply: &'static str, scans: usize) -> Fixture {
        let repo = Arc::new(InMemoryDocumentRepository::new());
        let storage = InMemoryStorage::new();
        let store = DocumentStore::new(repo.clone());
        let events: Arc<dyn DocumentEventSink> = Arc::new(NoOpEventSink);
        let uploads = UploadOrchestrator::new(
            store.clone(),
            Arc::new(storage.clone()),
            scanning_client(reply, scans),
            events.clone(),
        );
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        let service = DocumentService::new(
            store,
            Arc::new(storage.clone()),
            uploads,
            SearchEngine::new(repo, 100),
            events,
            Arc::new(clock),
        );
        Fixture { storage, service }
    }

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            mime_type: "application/pdf".to_string(),
            content: Bytes::from_static(b"bytes"),
        }
    }

    fn caller() -> RequestContext {
        RequestContext::new("hr").with_username("dana")
    }

    fn medical_caller() -> RequestContext {
        caller().with_roles([ROLE_MEDICAL])
    }

    #[tokio::test]
    async fn test_upload_sanitizes_filename_and_uses_clock() {
        let f = fixture(1);
        let uuid = Uuid::new_v4();
        let err = f
            .service
            .upload(
                &caller(),
                DocumentType::Attachment,
                uuid,
                file("../../etc/notes.TXT"),
                json!({"team": "hr"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let document = f
            .service
            .upload(
                &caller(),
                DocumentType::Attachment,
                uuid,
                file("C:\\scans\\notes.TXT"),
                json!({"team": "hr"}),
            )
            .await
            .unwrap();
        assert_eq!(document.file.filename, "notes.TXT");
        assert_eq!(document.file.file_extension, "txt");
        assert_eq!(
            document.created_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_upload_accepts_free_form_metadata() {
        let f = fixture(1);
        let uuid = Uuid::new_v4();
        let metadata = json!({
            "prison code": "MDI",
            "line items": [{"sku": "A-1", "qty": 2}],
            "approved": true,
        });

        let document = f
            .service
            .upload(&caller(), DocumentType::Invoice, uuid, file("a.pdf"), metadata.clone())
            .await
            .unwrap();
        assert_eq!(serde_json::Value::Object(document.metadata), metadata);

        let err = f
            .service
            .upload(&caller(), DocumentType::Invoice, Uuid::new_v4(), file("b.pdf"), json!(null))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_rejected_when_scanner_errors() {
        let f = fixture_replying("stream: Can't allocate memory ERROR\0", 1);
        let uuid = Uuid::new_v4();

        let err = f
            .service
            .upload(&caller(), DocumentType::Invoice, uuid, file("a.pdf"), json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::VirusDetected { .. }));
        assert!(f.storage.is_empty());
        assert!(matches!(
            f.service.get(&caller(), uuid).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_restricted_type_requires_role() {
        let f = fixture(1);
        let uuid = Uuid::new_v4();

        let err = f
            .service
            .upload(
                &caller(),
                DocumentType::MedicalCertificate,
                uuid,
                file("cert.pdf"),
                json!({}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));

        f.service
            .upload(
                &medical_caller(),
                DocumentType::MedicalCertificate,
                uuid,
                file("cert.pdf"),
                json!({}),
            )
            .await
            .unwrap();

        // The stored type wins for UUID-addressed operations
        let err = f.service.get(&caller(), uuid).await.unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));
        let err = f.service.delete(&caller(), uuid).await.unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));

        let sensitive = caller().with_roles([ROLE_SENSITIVE]);
        assert!(f.service.get(&sensitive, uuid).await.is_ok());
    }

    #[tokio::test]
    async fn test_download_reports_missing_bytes() {
        let f = fixture(1);
        let uuid = Uuid::new_v4();
        f.service
            .upload(&caller(), DocumentType::Invoice, uuid, file("a.pdf"), json!({}))
            .await
            .unwrap();

        let (_, content) = f.service.download(&caller(), uuid).await.unwrap();
        assert_eq!(content, Bytes::from_static(b"bytes"));

        f.storage
            .delete("docvault-invoices", &uuid.to_string())
            .await
            .unwrap();
        let err = f.service.download(&caller(), uuid).await.unwrap_err();
        assert!(matches!(err, AppError::FileContentNotFound(_)));

        let err = f
            .service
            .download(&caller(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_replace_metadata_and_history() {
        let f = fixture(1);
        let uuid = Uuid::new_v4();
        f.service
            .upload(
                &caller(),
                DocumentType::Invoice,
                uuid,
                file("a.pdf"),
                json!({"v": "m1"}),
            )
            .await
            .unwrap();

        let err = f
            .service
            .replace_metadata(&caller(), uuid, json!(["not", "an", "object"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        f.service
            .replace_metadata(&caller(), uuid, json!({"v": "m2"}))
            .await
            .unwrap();
        f.service
            .replace_metadata(&caller(), uuid, json!({"v": "m3"}))
            .await
            .unwrap();

        let history = f.service.history(&caller(), uuid).await.unwrap();
        let values: Vec<_> = history.iter().map(|e| e.metadata["v"].clone()).collect();
        assert_eq!(values, vec![json!("m2"), json!("m1")]);
        assert_eq!(history[0].superseded_by.username.as_deref(), Some("dana"));
    }

    #[tokio::test]
    async fn test_delete_is_silent_and_idempotent() {
        let f = fixture(1);
        f.service.delete(&caller(), Uuid::new_v4()).await.unwrap();

        let uuid = Uuid::new_v4();
        f.service
            .upload(&caller(), DocumentType::Invoice, uuid, file("a.pdf"), json!({}))
            .await
            .unwrap();
        f.service.delete(&caller(), uuid).await.unwrap();
        f.service.delete(&caller(), uuid).await.unwrap();

        let err = f.service.get(&caller(), uuid).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_search_requires_criteria_and_authorization() {
        let f = fixture(2);
        f.service
            .upload(
                &caller(),
                DocumentType::Invoice,
                Uuid::new_v4(),
                file("a.pdf"),
                json!({"customer": "Acme"}),
            )
            .await
            .unwrap();
        f.service
            .upload(
                &medical_caller(),
                DocumentType::MedicalCertificate,
                Uuid::new_v4(),
                file("m.pdf"),
                json!({"customer": "Acme"}),
            )
            .await
            .unwrap();

        let empty = SearchRequest {
            page_size: 20,
            ..SearchRequest::default()
        };
        let err = f.service.search(&caller(), &empty).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let request = SearchRequest {
            document_type: Some(DocumentType::MedicalCertificate),
            page_size: 20,
            ..SearchRequest::default()
        };
        let err = f.service.search(&caller(), &request).await.unwrap_err();
        assert!(matches!(err, AppError::AccessDenied(_)));

        let request = SearchRequest {
            metadata: json!({"customer": "acme"}).as_object().cloned().unwrap(),
            page_size: 20,
            ..SearchRequest::default()
        };
        assert_eq!(f.service.search(&caller(), &request).await.unwrap().total, 1);
        assert_eq!(
            f.service
                .search(&medical_caller(), &request)
                .await
                .unwrap()
                .total,
            2
        );
    }

    #[tokio::test]
    async fn test_search_rejects_non_string_metadata_filter() {
        let f = fixture(0);
        let request = SearchRequest {
            document_type: Some(DocumentType::Invoice),
            metadata: json!({"amount": 120}).as_object().cloned().unwrap(),
            page_size: 20,
            ..SearchRequest::default()
        };

        let err = f.service.search(&caller(), &request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
