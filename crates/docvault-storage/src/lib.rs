//! DocVault Storage Library
//!
//! Object storage abstraction for document bytes, with implementations for S3
//! (and S3-compatible providers) and the local filesystem.
//!
//! # Layout
//!
//! Every document type owns a bucket; an object's key is the document UUID.
//! On the local backend a bucket is a directory under the storage root.
//! Keys must not contain `..`, a backslash, or a leading `/`; the `keys`
//! module centralizes those checks so all backends agree.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use docvault_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::InMemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ObjectStorage, StorageError, StorageResult};
