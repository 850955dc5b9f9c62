//! Store-agnostic document query builder.
//!
//! A [`DocumentQuery`] composes named predicates, sort keys and paging. It can
//! be evaluated directly against in-memory documents or translated into a
//! backing store's native query language by a repository implementation.
//! Soft-deleted documents are excluded by the store, not by predicates.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::error::AppError;
use crate::models::{
    Document, DocumentType, Page, SearchRequest, SortDirection, SortField, DEFAULT_PAGE_SIZE,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Document type is one of the set. An empty set matches nothing.
    TypeIn(BTreeSet<DocumentType>),
    /// Metadata value at `key` is a string containing `value`, ignoring case.
    MetadataContains { key: String, value: String },
}

impl Predicate {
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Predicate::TypeIn(types) => types.contains(&document.document_type),
            Predicate::MetadataContains { key, value } => document
                .metadata
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_lowercase().contains(&value.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortTarget {
    Field(SortField),
    /// Surrogate id, the final tie-breaker
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub target: SortTarget,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self {
            target: SortTarget::Field(field),
            direction,
        }
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = match self.target {
            SortTarget::Id => a.id.cmp(&b.id),
            SortTarget::Field(field) => match field {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Filename => a.file.filename.cmp(&b.file.filename),
                SortField::FileSize => a.file.file_size.cmp(&b.file.file_size),
                // Declaration order, same as the database enum
                SortField::DocumentType => a.document_type.cmp(&b.document_type),
                SortField::MimeType => a.file.mime_type.cmp(&b.file.mime_type),
                SortField::FileExtension => a.file.file_extension.cmp(&b.file.file_extension),
            },
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    predicates: Vec<Predicate>,
    sort: Vec<SortKey>,
    page: u32,
    page_size: u32,
}

impl Default for DocumentQuery {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
            sort: Vec::new(),
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the query for a search request. The type predicate is the
    /// requested type when present, else every authorized type.
    pub fn from_search(
        request: &SearchRequest,
        authorized: &BTreeSet<DocumentType>,
    ) -> Result<Self, AppError> {
        let types = match request.document_type {
            Some(document_type) => BTreeSet::from([document_type]),
            None => authorized.clone(),
        };

        let mut query = Self::new().type_in(types);
        for (key, value) in request.metadata_filter()? {
            query = query.metadata_contains(key, value);
        }
        Ok(query
            .order_by(request.order_by, request.direction)
            .paginate(request.page, request.page_size))
    }

    pub fn type_in(mut self, types: impl IntoIterator<Item = DocumentType>) -> Self {
        self.predicates
            .push(Predicate::TypeIn(types.into_iter().collect()));
        self
    }

    pub fn metadata_contains(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate::MetadataContains {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort.push(SortKey::new(field, direction));
        self
    }

    pub fn paginate(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.page_size)
    }

    /// Requested sort keys followed by the implicit tie-breakers: creation
    /// time descending (unless already requested) then surrogate id
    /// descending.
    pub fn sort_keys(&self) -> Vec<SortKey> {
        let mut keys = self.sort.clone();
        let has_created = keys
            .iter()
            .any(|k| k.target == SortTarget::Field(SortField::CreatedAt));
        if !has_created {
            keys.push(SortKey::new(SortField::CreatedAt, SortDirection::Desc));
        }
        keys.push(SortKey {
            target: SortTarget::Id,
            direction: SortDirection::Desc,
        });
        keys
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.predicates.iter().all(|p| p.matches(document))
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        self.sort_keys()
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Evaluate the query over documents already restricted to active ones.
    pub fn evaluate<'a, I>(&self, documents: I) -> Page<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut matched: Vec<&Document> =
            documents.into_iter().filter(|d| self.matches(d)).collect();
        let keys = self.sort_keys();
        matched.sort_by(|a, b| {
            keys.iter()
                .map(|key| key.compare(a, b))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        let total = matched.len() as i64;
        let items = matched
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.page_size as usize)
            .cloned()
            .collect();

        Page {
            items,
            total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}
