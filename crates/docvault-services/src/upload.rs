//! Upload orchestration
//!
//! Scans the bytes, inserts the document row inside a transaction, writes the
//! bytes to the type's bucket, and only then commits. A failed object write
//! rolls the row back so the same UUID can be retried.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use docvault_core::models::{Document, DocumentType, FileDescriptor, Metadata};
use docvault_core::{AppError, DocumentEvent, DocumentEventSink, RequestContext};
use docvault_storage::ObjectStorage;
use uuid::Uuid;

use crate::clamav::VirusScanClient;
use crate::document_store::DocumentStore;

/// File received from a caller.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub mime_type: String,
    pub content: Bytes,
}

impl UploadedFile {
    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor::new(
            self.filename.clone(),
            self.content.len() as i64,
            self.mime_type.clone(),
        )
    }
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    store: DocumentStore,
    storage: Arc<dyn ObjectStorage>,
    scanner: VirusScanClient,
    events: Arc<dyn DocumentEventSink>,
}

impl UploadOrchestrator {
    pub fn new(
        store: DocumentStore,
        storage: Arc<dyn ObjectStorage>,
        scanner: VirusScanClient,
        events: Arc<dyn DocumentEventSink>,
    ) -> Self {
        Self {
            store,
            storage,
            scanner,
            events,
        }
    }

    /// Caller must have authorized `document_type` already.
    #[tracing::instrument(skip(self, file, metadata, context, now), fields(uuid = %uuid, document_type = %document_type))]
    pub async fn upload(
        &self,
        document_type: DocumentType,
        uuid: Uuid,
        file: UploadedFile,
        metadata: Metadata,
        context: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<Document, AppError> {
        let start = Instant::now();

        self.store.ensure_unbound(uuid).await?;
        self.scanner.scan_and_fail(&file.content[..]).await?;

        let actor = context.actor();
        let mut tx = self.store.repository().begin().await?;
        let document = tx
            .insert(DocumentStore::new_document(
                document_type,
                uuid,
                file.descriptor(),
                metadata,
                &actor,
                now,
            ))
            .await?;

        let bucket = document.bucket();
        let key = document.storage_key();

        if let Err(e) = self.storage.put(bucket, &key, file.content).await {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                "Storing document bytes failed, rolling back"
            );
            tx.rollback().await?;
            return Err(e.into());
        }

        if let Err(e) = tx.commit().await {
            tracing::error!(error = %e, bucket = %bucket, key = %key, "Commit failed after storing bytes");
            if let Err(cleanup) = self.storage.delete(bucket, &key).await {
                tracing::warn!(
                    error = %cleanup,
                    bucket = %bucket,
                    key = %key,
                    "Failed to remove orphaned object"
                );
            }
            return Err(e);
        }

        let elapsed = start.elapsed();
        tracing::info!(
            bucket = %bucket,
            key = %key,
            file_size = document.file.file_size,
            duration_ms = elapsed.as_secs_f64() * 1000.0,
            "Document uploaded"
        );

        self.events
            .emit(
                DocumentEvent::Uploaded {
                    document: Box::new(document.clone()),
                    elapsed,
                },
                context,
                now,
            )
            .await;

        Ok(document)
    }
}
