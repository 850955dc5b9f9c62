//! DocVault Core Library
//!
//! This crate provides the document domain model, the document-type policy
//! table, authorization, the metadata history ledger, store-agnostic search
//! predicates, error types, configuration and validation shared by all
//! DocVault components.

pub mod authorization;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod hooks;
pub mod ledger;
pub mod models;
pub mod query;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, DocVaultConfig};
pub use context::RequestContext;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hooks::{DocumentEvent, DocumentEventSink, NoOpEventSink};
pub use query::{DocumentQuery, Predicate, SortKey, SortTarget};
pub use storage_types::StorageBackend;
