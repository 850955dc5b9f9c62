//! DocVault Services Layer
//!
//! Business services over the core model and its collaborators: the clamd
//! scanning client, the document lifecycle store, search, upload
//! orchestration, and the request-level [`DocumentService`] facade that
//! authorizes every call before delegating.

pub mod audit;
pub mod clamav;
pub mod document_store;
pub mod search;
pub mod service;
pub mod upload;

pub use audit::TracingAuditSink;
pub use clamav::{
    classify, ConnectionProvider, ScanOutcome, ScanStatus, TcpConnectionProvider, VirusScanClient,
};
pub use document_store::DocumentStore;
pub use search::SearchEngine;
pub use service::DocumentService;
pub use upload::{UploadOrchestrator, UploadedFile};
