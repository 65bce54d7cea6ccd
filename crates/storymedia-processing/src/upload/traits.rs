//! Traits for the upload stage.

use async_trait::async_trait;

use storymedia_core::models::{LocalFile, ResourceDescriptor};

use super::types::UploadMetadata;

/// Backend store receiving the final files.
///
/// Returns the stored resource as the backend describes it; the returned
/// descriptor carries the backend-issued id.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload_file(
        &self,
        file: &LocalFile,
        metadata: &UploadMetadata,
    ) -> anyhow::Result<ResourceDescriptor>;
}
