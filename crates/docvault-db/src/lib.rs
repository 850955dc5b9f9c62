//! DocVault database layer
//!
//! Persistence for documents and their metadata history: the repository
//! traits consumed by services, a PostgreSQL implementation, and an
//! in-memory implementation used by tests and local runs.

pub mod db;

pub use db::{
    run_migrations, setup_database, DocumentRepository, DocumentTransaction,
    InMemoryDocumentRepository, PostgresDocumentRepository,
};
