//! Upload stage contracts: the uploader and the metadata it receives.

pub mod traits;
pub mod types;

pub use traits::Uploader;
pub use types::UploadMetadata;
