use crate::keys::{extension_for, generate_storage_key};
use crate::traits::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use storymedia_core::models::{LocalFile, ResourceDescriptor, ResourceId, ResourceKind};
use storymedia_processing::upload::{UploadMetadata, Uploader};

/// Local filesystem uploader
#[derive(Clone)]
pub struct LocalUploader {
    base_path: PathBuf,
    base_url: String,
}

impl LocalUploader {
    /// Create a new LocalUploader instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for stored files (e.g., "./uploads")
    /// * `base_url` - Base URL the files are served from (e.g., "http://localhost:8080/uploads")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create upload directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalUploader {
            base_path,
            base_url,
        })
    }

    /// Convert storage key to filesystem path with security validation
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);
        if path.strip_prefix(&self.base_path).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    /// Generate public URL for file
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write `data` under `storage_key` and return the public URL.
    pub async fn store(&self, storage_key: &str, data: &[u8]) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local upload successful"
        );

        Ok(self.generate_url(storage_key))
    }
}

#[async_trait]
impl Uploader for LocalUploader {
    async fn upload_file(
        &self,
        file: &LocalFile,
        metadata: &UploadMetadata,
    ) -> anyhow::Result<ResourceDescriptor> {
        let id = Uuid::new_v4();
        let key = generate_storage_key(Utc::now(), id, &extension_for(&file.name, &file.mime_type));
        let url = self.store(&key, &file.data).await?;

        let kind = metadata.kind;
        let mut resource = ResourceDescriptor::placeholder(kind, file.mime_type.clone())
            .with_id(ResourceId::new(id.to_string()))
            .with_src(url);
        resource.width = metadata.width;
        resource.height = metadata.height;
        resource.duration_seconds = metadata.duration_seconds;
        resource.is_muted = metadata.is_muted();
        resource.is_optimized = kind.is_video_like() && file.mime_type == "video/mp4";
        resource.alt = metadata.additional_data.alt_text.clone();
        resource.base_color = metadata.additional_data.base_color.clone();
        resource.blur_hash = metadata.additional_data.blur_hash.clone();

        // Visual files without known dimensions stay placeholders.
        let has_dimensions = resource.width.is_some() && resource.height.is_some();
        if has_dimensions || kind == ResourceKind::Audio {
            resource = resource.confirmed();
        }

        Ok(resource)
    }
}
