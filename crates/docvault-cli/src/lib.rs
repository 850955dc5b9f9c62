//! Shared plumbing for the `docvault` operator binary.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use docvault_core::models::Metadata;
use docvault_core::{Config, DocumentEventSink, RequestContext, SystemClock};
use docvault_db::PostgresDocumentRepository;
use docvault_services::{
    DocumentService, DocumentStore, SearchEngine, TracingAuditSink, UploadOrchestrator,
    VirusScanClient,
};
use docvault_storage::create_storage;
use sqlx::PgPool;

/// Initialize tracing for the CLI.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docvault=debug,audit=info")),
        )
        .init();
}

/// Parse a `key=value` search filter argument.
pub fn parse_filter(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Filter '{}' must have the form key=value", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Filter '{}' has an empty key", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Search metadata criteria from `key=value` filters.
pub fn filters_to_map(filters: &[(String, String)]) -> Metadata {
    filters
        .iter()
        .map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone())))
        .collect()
}

/// Parse metadata given on the command line. Absent means an empty object.
pub fn parse_metadata(raw: Option<&str>) -> Result<serde_json::Value> {
    match raw {
        None => Ok(serde_json::Value::Object(Default::default())),
        Some(raw) => serde_json::from_str(raw).context("Metadata must be valid JSON"),
    }
}

pub fn request_context(service: &str, user: Option<&str>, roles: &[String]) -> RequestContext {
    let context = RequestContext::new(service).with_roles(roles.iter().cloned());
    match user {
        Some(user) => context.with_username(user),
        None => context,
    }
}

/// Wire the document service against PostgreSQL, the configured object
/// store and the configured scanner.
pub async fn build_service(config: &Config, pool: PgPool) -> Result<DocumentService> {
    let repository = Arc::new(PostgresDocumentRepository::new(pool));
    let storage = create_storage(config)
        .await
        .context("Failed to initialize object storage")?;
    let events: Arc<dyn DocumentEventSink> = Arc::new(TracingAuditSink);

    let store = DocumentStore::new(repository.clone());
    let uploads = UploadOrchestrator::new(
        store.clone(),
        storage.clone(),
        VirusScanClient::from_config(config),
        events.clone(),
    );
    let search = SearchEngine::new(repository, config.search_max_page_size());

    Ok(DocumentService::new(
        store,
        storage,
        uploads,
        search,
        events,
        Arc::new(SystemClock),
    ))
}
