//! In-memory document repository
//!
//! Lets the lifecycle services run without a database. Inserts are staged in
//! their transaction and only become visible on commit; an uncommitted UUID
//! is still reserved so concurrent inserts of the same UUID conflict.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docvault_core::ledger;
use docvault_core::models::{
    Actor, Document, DocumentState, DocumentType, Metadata, MetadataHistoryEntry, NewDocument,
    Page,
};
use docvault_core::{AppError, DocumentQuery};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::repository::{DocumentRepository, DocumentTransaction};

#[derive(Default)]
struct State {
    next_document_id: i64,
    next_history_id: i64,
    documents: HashMap<i64, Document>,
    by_uuid: HashMap<Uuid, i64>,
    reserved: HashSet<Uuid>,
    history: Vec<MetadataHistoryEntry>,
}

#[derive(Clone, Default)]
pub struct InMemoryDocumentRepository {
    state: Arc<Mutex<State>>,
    fail_commits: Arc<AtomicBool>,
}

fn lock(state: &Mutex<State>) -> Result<MutexGuard<'_, State>, AppError> {
    state
        .lock()
        .map_err(|_| AppError::Internal("Document repository lock poisoned".to_string()))
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of committed documents, soft-deleted included.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.documents.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn by_uuid(state: &State, uuid: Uuid) -> Option<&Document> {
        state
            .by_uuid
            .get(&uuid)
            .and_then(|id| state.documents.get(id))
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn exists_any(&self, uuid: Uuid) -> Result<bool, AppError> {
        Ok(lock(&self.state)?.by_uuid.contains_key(&uuid))
    }

    async fn find_active(&self, uuid: Uuid) -> Result<Option<Document>, AppError> {
        let state = lock(&self.state)?;
        Ok(Self::by_uuid(&state, uuid)
            .filter(|d| d.is_active())
            .cloned())
    }

    async fn find_any(&self, uuid: Uuid) -> Result<Option<Document>, AppError> {
        let state = lock(&self.state)?;
        Ok(Self::by_uuid(&state, uuid).cloned())
    }

    async fn type_of(&self, uuid: Uuid) -> Result<Option<DocumentType>, AppError> {
        let state = lock(&self.state)?;
        Ok(Self::by_uuid(&state, uuid).map(|d| d.document_type))
    }

    async fn begin(&self) -> Result<Box<dyn DocumentTransaction>, AppError> {
        Ok(Box::new(InMemoryTransaction {
            state: self.state.clone(),
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
            staged: Vec::new(),
        }))
    }

    async fn replace_metadata(
        &self,
        document_id: i64,
        metadata: Metadata,
        at: DateTime<Utc>,
        by: &Actor,
    ) -> Result<Option<Document>, AppError> {
        let mut state = lock(&self.state)?;

        let Some(stored) = state
            .documents
            .get_mut(&document_id)
            .filter(|d| d.is_active())
        else {
            return Ok(None);
        };
        let entry = ledger::append(stored, metadata, at, by);
        let updated = stored.clone();

        state.next_history_id += 1;
        let id = state.next_history_id;
        state.history.push(MetadataHistoryEntry {
            id,
            document_id: entry.document_id,
            metadata: entry.metadata,
            superseded_at: entry.superseded_at,
            superseded_by: entry.superseded_by,
        });

        Ok(Some(updated))
    }

    async fn mark_deleted(
        &self,
        document_id: i64,
        at: DateTime<Utc>,
        by: &Actor,
    ) -> Result<bool, AppError> {
        let mut state = lock(&self.state)?;
        match state.documents.get_mut(&document_id) {
            Some(document) if document.is_active() => {
                document.state = DocumentState::Deleted { at, by: by.clone() };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn history(&self, document_id: i64) -> Result<Vec<MetadataHistoryEntry>, AppError> {
        let state = lock(&self.state)?;
        let mut entries: Vec<MetadataHistoryEntry> = state
            .history
            .iter()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(entries)
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Page<Document>, AppError> {
        let state = lock(&self.state)?;
        Ok(query.evaluate(state.documents.values().filter(|d| d.is_active())))
    }
}

struct InMemoryTransaction {
    state: Arc<Mutex<State>>,
    fail_commit: bool,
    staged: Vec<Document>,
}

impl InMemoryTransaction {
    fn release(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            for document in self.staged.drain(..) {
                state.reserved.remove(&document.uuid);
            }
        }
    }
}

#[async_trait]
impl DocumentTransaction for InMemoryTransaction {
    async fn insert(&mut self, document: NewDocument) -> Result<Document, AppError> {
        let mut state = lock(&self.state)?;
        if state.by_uuid.contains_key(&document.uuid) || state.reserved.contains(&document.uuid) {
            return Err(AppError::Conflict(format!(
                "Document {} already exists",
                document.uuid
            )));
        }

        state.next_document_id += 1;
        let inserted = Document {
            id: state.next_document_id,
            uuid: document.uuid,
            document_type: document.document_type,
            file: document.file,
            metadata: document.metadata,
            created_at: document.created_at,
            created_by: document.created_by,
            state: DocumentState::Active,
        };
        state.reserved.insert(inserted.uuid);
        drop(state);

        self.staged.push(inserted.clone());
        Ok(inserted)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), AppError> {
        if self.fail_commit {
            self.release();
            return Err(AppError::Internal("Injected commit failure".to_string()));
        }

        let mut state = lock(&self.state)?;
        for document in self.staged.drain(..) {
            state.reserved.remove(&document.uuid);
            state.by_uuid.insert(document.uuid, document.id);
            state.documents.insert(document.id, document);
        }
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), AppError> {
        self.release();
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        self.release();
    }
}
