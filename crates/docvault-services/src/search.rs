use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use docvault_core::models::{Document, DocumentType, Page, SearchRequest};
use docvault_core::{AppError, DocumentQuery};
use docvault_db::DocumentRepository;

/// Runs document searches restricted to a caller's authorized types.
#[derive(Clone)]
pub struct SearchEngine {
    repository: Arc<dyn DocumentRepository>,
    max_page_size: u32,
}

impl SearchEngine {
    pub fn new(repository: Arc<dyn DocumentRepository>, max_page_size: u32) -> Self {
        Self {
            repository,
            max_page_size: max_page_size.max(1),
        }
    }

    /// Build the query for a request. Page sizes above the configured
    /// maximum are clamped.
    pub fn build_query(
        &self,
        request: &SearchRequest,
        authorized: &BTreeSet<DocumentType>,
    ) -> Result<DocumentQuery, AppError> {
        let query = DocumentQuery::from_search(request, authorized)?;
        let requested = query.page_size();
        let page_size = requested.clamp(1, self.max_page_size);
        if page_size != requested {
            tracing::debug!(
                requested,
                page_size,
                max_page_size = self.max_page_size,
                "Search page size clamped"
            );
        }
        let page = query.page();
        Ok(query.paginate(page, page_size))
    }

    pub async fn search(
        &self,
        request: &SearchRequest,
        authorized: &BTreeSet<DocumentType>,
    ) -> Result<Page<Document>, AppError> {
        let start = Instant::now();
        let query = self.build_query(request, authorized)?;
        let page = self.repository.query(&query).await?;

        tracing::debug!(
            document_type = ?request.document_type,
            metadata_filters = request.metadata.len(),
            total = page.total,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Search completed"
        );

        Ok(page)
    }
}
