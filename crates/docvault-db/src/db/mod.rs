//! Database repositories for data access layer
//
// Repository traits
pub mod repository;
//
// Row mapping between tables and domain models
pub mod rows;
//
// Predicate and sort translation to SQL
pub mod query_sql;
//
// Implementations
pub mod memory;
pub mod postgres;
//
// Pool setup and migrations
pub mod setup;

pub use memory::InMemoryDocumentRepository;
pub use postgres::PostgresDocumentRepository;
pub use repository::{DocumentRepository, DocumentTransaction};
pub use setup::{run_migrations, setup_database};
