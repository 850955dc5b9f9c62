//! Validation modules

pub mod filename;
pub mod metadata;

pub use filename::sanitize_filename;
pub use metadata::{metadata_from_value, search_filter_from_value};
