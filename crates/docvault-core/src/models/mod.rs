//! Data models for DocVault
//!
//! Each sub-module represents one part of the document domain.

mod document;
mod document_type;
mod metadata_history;
mod search;

pub use document::*;
pub use document_type::*;
pub use metadata_history::*;
pub use search::*;
