//! Hooks for document lifecycle events
//!
//! Components report what happened through [`DocumentEventSink`]. Delivery is
//! fire-and-forget from the caller's point of view: a sink must swallow its
//! own failures.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::models::{Document, DocumentType};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DocumentEvent {
    Uploaded {
        document: Box<Document>,
        #[serde(serialize_with = "serialize_millis")]
        elapsed: Duration,
    },
    MetadataReplaced {
        uuid: Uuid,
        document_type: DocumentType,
    },
    Deleted {
        uuid: Uuid,
        document_type: DocumentType,
    },
}

impl DocumentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DocumentEvent::Uploaded { .. } => "document_uploaded",
            DocumentEvent::MetadataReplaced { .. } => "document_metadata_replaced",
            DocumentEvent::Deleted { .. } => "document_deleted",
        }
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[async_trait]
pub trait DocumentEventSink: Send + Sync {
    async fn emit(&self, event: DocumentEvent, context: &RequestContext, timestamp: DateTime<Utc>);
}

/// Sink that drops every event.
pub struct NoOpEventSink;

#[async_trait]
impl DocumentEventSink for NoOpEventSink {
    async fn emit(&self, _event: DocumentEvent, _context: &RequestContext, _timestamp: DateTime<Utc>) {}
}
