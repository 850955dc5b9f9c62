//! Audit trail of document lifecycle events
//!
//! Events are written as structured JSON on the `audit` tracing target so a
//! subscriber can route them separately from operational logs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docvault_core::{DocumentEvent, DocumentEventSink, RequestContext};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: &'static str,
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub details: serde_json::Value,
}

impl AuditLogEntry {
    pub fn new(event: &DocumentEvent, context: &RequestContext, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            event_type: event.name(),
            service_name: context.service_name.clone(),
            username: context.username.clone(),
            details: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn log(&self) {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        tracing::event!(
            target: "audit",
            tracing::Level::INFO,
            audit_entry = %json,
            event_type = self.event_type,
            service_name = %self.service_name,
            username = ?self.username,
            "Document audit log"
        );
    }
}

/// Event sink that writes every event to the audit log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl DocumentEventSink for TracingAuditSink {
    async fn emit(&self, event: DocumentEvent, context: &RequestContext, timestamp: DateTime<Utc>) {
        AuditLogEntry::new(&event, context, timestamp).log();
    }
}
