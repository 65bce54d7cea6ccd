//! Storymedia Storage Library
//!
//! Backend stores that implement the pipeline's `Uploader` contract.
//!
//! # Storage key format
//!
//! Files are stored as `{yyyy}/{mm}/{uuid}.{ext}` below the base directory.
//! Keys must not contain `..` or a leading `/`.

pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-local")]
pub use local::LocalUploader;
pub use traits::{StorageError, StorageResult};
