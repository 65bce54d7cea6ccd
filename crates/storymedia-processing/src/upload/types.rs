//! Types for the upload stage.

use serde::Serialize;

use storymedia_core::models::{AdditionalData, BatchId, ResourceDescriptor, ResourceId, ResourceKind};

/// Metadata forwarded to the uploader alongside the file.
#[derive(Clone, Debug, Serialize)]
pub struct UploadMetadata {
    pub kind: ResourceKind,
    pub batch_id: BatchId,
    /// Id the resource had locally before this upload.
    pub local_resource_id: ResourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(flatten)]
    pub additional_data: AdditionalData,
}

impl UploadMetadata {
    pub fn for_resource(
        resource: &ResourceDescriptor,
        batch_id: BatchId,
        additional_data: AdditionalData,
    ) -> Self {
        Self {
            kind: resource.kind,
            batch_id,
            local_resource_id: resource.id.clone(),
            width: resource.width,
            height: resource.height,
            duration_seconds: resource.duration_seconds,
            additional_data,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.additional_data.is_muted.unwrap_or(false)
    }
}
