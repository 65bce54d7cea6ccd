//! Collaborator traits for media processing
//!
//! The pipeline never transcodes or inspects media itself; it drives these
//! collaborators and reacts to what they return. Each call may fail, and a
//! failure is reported through `anyhow::Error`.

use async_trait::async_trait;

use storymedia_core::models::{CropParams, LocalFile, ResourceDescriptor, TrimRange};

/// Codec engine used by the transcode-class stage drivers.
///
/// The scheduler runs at most one transform at a time. `extract_first_frame`
/// is not serialized and may overlap a running transform or another
/// frame extraction.
#[async_trait]
pub trait MediaTransformer: Send + Sync {
    /// Convert a HEIF/HEIC still into `target_mime`.
    async fn convert_heif(&self, file: &LocalFile, target_mime: &str) -> anyhow::Result<LocalFile>;

    /// Convert an animated GIF into a (silent) video.
    async fn convert_gif_to_video(&self, file: &LocalFile) -> anyhow::Result<LocalFile>;

    async fn trim_video(&self, file: &LocalFile, range: TrimRange) -> anyhow::Result<LocalFile>;

    async fn mute_video(&self, file: &LocalFile) -> anyhow::Result<LocalFile>;

    async fn crop_video(&self, file: &LocalFile, params: &CropParams) -> anyhow::Result<LocalFile>;

    /// Generic transcode into a broadly playable format.
    async fn optimize_video(&self, file: &LocalFile) -> anyhow::Result<LocalFile>;

    /// First frame of a video as a still image.
    async fn extract_first_frame(&self, file: &LocalFile) -> anyhow::Result<LocalFile>;
}

/// Preliminary metadata derived from a local file.
#[derive(Debug, Clone)]
pub struct LocalResource {
    pub resource: ResourceDescriptor,
    pub poster_file: Option<LocalFile>,
}

/// Derives a resource descriptor from a local file without transforming it.
#[async_trait]
pub trait ResourceIntrospector: Send + Sync {
    async fn resource_from_local_file(&self, file: &LocalFile) -> anyhow::Result<LocalResource>;
}

/// Decides whether a video can skip the optimize stage.
///
/// The acceptable codec/format set is deployment-specific, so the check
/// is pluggable. Implementations answer `false` when unsure.
#[async_trait]
pub trait OptimizationPolicy: Send + Sync {
    async fn is_already_optimized(&self, resource: &ResourceDescriptor, file: &LocalFile) -> bool;
}

/// Trusts the descriptor's own `is_optimized` flag.
pub struct ResourceFlagPolicy;

#[async_trait]
impl OptimizationPolicy for ResourceFlagPolicy {
    async fn is_already_optimized(&self, resource: &ResourceDescriptor, _file: &LocalFile) -> bool {
        resource.is_optimized
    }
}

/// Accepts any of the listed container mime types as already optimized.
pub struct MimeAllowListPolicy {
    accepted: Vec<String>,
}

impl MimeAllowListPolicy {
    pub fn new(accepted: Vec<String>) -> Self {
        Self {
            accepted: accepted.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl OptimizationPolicy for MimeAllowListPolicy {
    async fn is_already_optimized(&self, resource: &ResourceDescriptor, file: &LocalFile) -> bool {
        resource.is_optimized || self.accepted.iter().any(|m| m == &file.mime_type)
    }
}
