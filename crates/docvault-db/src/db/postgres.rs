use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docvault_core::ledger;
use docvault_core::models::{
    Actor, Document, DocumentType, Metadata, MetadataHistoryEntry, NewDocument, Page,
};
use docvault_core::{AppError, DocumentQuery};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::query_sql::{build_count, build_select};
use super::repository::{DocumentRepository, DocumentTransaction};
use super::rows::{rows_to_documents, DocumentRow, HistoryRow};

/// Map an insert failure, turning a UUID unique violation into a conflict.
fn map_insert_error(err: sqlx::Error, uuid: Uuid) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return AppError::Conflict(format!("Document {} already exists", uuid));
        }
    }
    AppError::Database(err)
}

/// PostgreSQL-backed document repository
#[derive(Clone)]
pub struct PostgresDocumentRepository {
    pool: PgPool,
}

impl PostgresDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select", uuid = %uuid))]
    async fn exists_any(&self, uuid: Uuid) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM documents WHERE uuid = $1)")
                .bind(uuid)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select", uuid = %uuid))]
    async fn find_active(&self, uuid: Uuid) -> Result<Option<Document>, AppError> {
        let row: Option<DocumentRow> = sqlx::query_as::<Postgres, DocumentRow>(
            "SELECT * FROM documents WHERE uuid = $1 AND deleted_at IS NULL",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Document::try_from).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select", uuid = %uuid))]
    async fn find_any(&self, uuid: Uuid) -> Result<Option<Document>, AppError> {
        let row: Option<DocumentRow> =
            sqlx::query_as::<Postgres, DocumentRow>("SELECT * FROM documents WHERE uuid = $1")
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Document::try_from).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select", uuid = %uuid))]
    async fn type_of(&self, uuid: Uuid) -> Result<Option<DocumentType>, AppError> {
        let document_type: Option<DocumentType> =
            sqlx::query_scalar("SELECT document_type FROM documents WHERE uuid = $1")
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(document_type)
    }

    async fn begin(&self) -> Result<Box<dyn DocumentTransaction>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgDocumentTransaction { tx }))
    }

    #[tracing::instrument(skip(self, metadata, by), fields(db.table = "documents", db.operation = "update", db.record_id = document_id))]
    async fn replace_metadata(
        &self,
        document_id: i64,
        metadata: Metadata,
        at: DateTime<Utc>,
        by: &Actor,
    ) -> Result<Option<Document>, AppError> {
        let start = std::time::Instant::now();
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent replaces so each one snapshots the
        // value the previous one installed
        let row: Option<DocumentRow> = sqlx::query_as::<Postgres, DocumentRow>(
            "SELECT * FROM documents WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(document_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut document = Document::try_from(row)?;
        let entry = ledger::append(&mut document, metadata, at, by);

        sqlx::query(
            r#"
            INSERT INTO document_metadata_history (
                document_id, metadata, superseded_at,
                superseded_by_service, superseded_by_username
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.document_id)
        .bind(JsonValue::Object(entry.metadata))
        .bind(entry.superseded_at)
        .bind(&entry.superseded_by.service_name)
        .bind(&entry.superseded_by.username)
        .execute(&mut *tx)
        .await?;

        let row: DocumentRow = sqlx::query_as::<Postgres, DocumentRow>(
            "UPDATE documents SET metadata = $2 WHERE id = $1 RETURNING *",
        )
        .bind(document_id)
        .bind(JsonValue::Object(document.metadata))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            uuid = %row.uuid,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Document metadata replaced"
        );

        Document::try_from(row).map(Some)
    }

    #[tracing::instrument(skip(self, by), fields(db.table = "documents", db.operation = "update", db.record_id = document_id))]
    async fn mark_deleted(
        &self,
        document_id: i64,
        at: DateTime<Utc>,
        by: &Actor,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET deleted_at = $2, deleted_by_service = $3, deleted_by_username = $4
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(document_id)
        .bind(at)
        .bind(&by.service_name)
        .bind(&by.username)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "document_metadata_history", db.operation = "select", db.record_id = document_id))]
    async fn history(&self, document_id: i64) -> Result<Vec<MetadataHistoryEntry>, AppError> {
        let rows: Vec<HistoryRow> = sqlx::query_as::<Postgres, HistoryRow>(
            "SELECT * FROM document_metadata_history WHERE document_id = $1 ORDER BY id DESC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(MetadataHistoryEntry::try_from)
            .collect()
    }

    #[tracing::instrument(skip(self, query), fields(db.table = "documents", db.operation = "search", predicate_count = query.predicates().len()))]
    async fn query(&self, query: &DocumentQuery) -> Result<Page<Document>, AppError> {
        let start = std::time::Instant::now();

        let mut count = build_count(query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut select = build_select(query);
        let rows: Vec<DocumentRow> = select
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(
            total,
            returned = rows.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Document search executed"
        );

        Ok(Page {
            items: rows_to_documents(rows)?,
            total,
            page: query.page(),
            page_size: query.page_size(),
        })
    }
}

/// Insert transaction on a pooled connection. Dropping it rolls back.
pub struct PgDocumentTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl DocumentTransaction for PgDocumentTransaction {
    #[tracing::instrument(skip(self, document), fields(db.table = "documents", db.operation = "insert", uuid = %document.uuid))]
    async fn insert(&mut self, document: NewDocument) -> Result<Document, AppError> {
        let uuid = document.uuid;
        let row: DocumentRow = sqlx::query_as::<Postgres, DocumentRow>(
            r#"
            INSERT INTO documents (
                uuid, document_type, filename, file_extension, file_size, file_hash,
                mime_type, metadata, created_at, created_by_service, created_by_username
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(document.uuid)
        .bind(document.document_type)
        .bind(&document.file.filename)
        .bind(&document.file.file_extension)
        .bind(document.file.file_size)
        .bind(&document.file.file_hash)
        .bind(&document.file.mime_type)
        .bind(JsonValue::Object(document.metadata))
        .bind(document.created_at)
        .bind(&document.created_by.service_name)
        .bind(&document.created_by.username)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, uuid))?;

        Document::try_from(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
