use std::path::Path;

use storymedia_core::models::{LocalFile, ResourceKind};
use storymedia_core::{PipelineConfig, PipelineError};

/// Common validation errors for media files
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Content type {content_type} does not match extension '{extension}' (expected one of: {expected})")]
    ExtensionMismatch {
        content_type: String,
        extension: String,
        expected: String,
    },

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for PipelineError {
    fn from(err: ValidationError) -> Self {
        PipelineError::Validation(err.to_string())
    }
}

/// Limits for one media kind.
#[derive(Debug, Clone)]
struct KindRules {
    max_file_size: usize,
    allowed_content_types: Vec<String>,
}

/// Media file validator
///
/// Runs before a file is enqueued; a rejected file never enters the queue.
#[derive(Debug, Clone)]
pub struct MediaValidator {
    image: KindRules,
    video: KindRules,
    audio: KindRules,
}

impl MediaValidator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            image: KindRules {
                max_file_size: config.max_image_size_bytes,
                allowed_content_types: config.image_allowed_content_types.clone(),
            },
            video: KindRules {
                max_file_size: config.max_video_size_bytes,
                allowed_content_types: config.video_allowed_content_types.clone(),
            },
            audio: KindRules {
                max_file_size: config.max_audio_size_bytes,
                allowed_content_types: config.audio_allowed_content_types.clone(),
            },
        }
    }

    fn rules(&self, kind: ResourceKind) -> &KindRules {
        match kind {
            ResourceKind::Image | ResourceKind::Gif => &self.image,
            ResourceKind::Video => &self.video,
            ResourceKind::Audio => &self.audio,
        }
    }

    /// Validate file size
    pub fn validate_file_size(&self, kind: ResourceKind, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        let max = self.rules(kind).max_file_size;
        if size > max {
            return Err(ValidationError::FileTooLarge { size, max });
        }

        Ok(())
    }

    /// Validate content type
    pub fn validate_content_type(
        &self,
        kind: ResourceKind,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        let normalized = content_type.to_lowercase();
        let rules = self.rules(kind);

        if !rules.allowed_content_types.iter().any(|ct| ct == &normalized) {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: rules.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    /// Validate that Content-Type matches the file extension
    /// This prevents Content-Type spoofing where a file is declared with a
    /// legitimate Content-Type that its name contradicts.
    pub fn validate_extension_content_type_match(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        let Some(extension) = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
        else {
            // Files without an extension (e.g. recordings) rely on the mime type alone.
            return Ok(());
        };

        let normalized_content_type = content_type.to_lowercase();

        let expected_content_types: Vec<&str> = match extension.as_str() {
            // Images
            "jpg" | "jpeg" => vec!["image/jpeg"],
            "png" => vec!["image/png"],
            "gif" => vec!["image/gif"],
            "webp" => vec!["image/webp"],
            "avif" => vec!["image/avif"],
            "heic" => vec!["image/heic", "image/heic-sequence"],
            "heif" => vec!["image/heif", "image/heif-sequence"],
            // Videos
            "mp4" => vec!["video/mp4"],
            "webm" => vec!["video/webm", "audio/webm"],
            "mov" => vec!["video/quicktime"],
            "m4v" => vec!["video/x-m4v", "video/mp4"],
            // Audio
            "mp3" => vec!["audio/mpeg", "audio/mp3"],
            "wav" => vec!["audio/wav", "audio/wave", "audio/x-wav"],
            "ogg" => vec!["audio/ogg", "application/ogg"],
            "m4a" => vec!["audio/mp4", "audio/x-m4a"],
            "aac" => vec!["audio/aac"],
            _ => {
                tracing::debug!(
                    extension = %extension,
                    content_type = %content_type,
                    "Unknown extension, skipping Content-Type/extension cross-validation"
                );
                return Ok(());
            }
        };

        if !expected_content_types
            .iter()
            .any(|ct| ct == &normalized_content_type)
        {
            return Err(ValidationError::ExtensionMismatch {
                content_type: content_type.to_string(),
                extension,
                expected: expected_content_types.join(", "),
            });
        }

        Ok(())
    }

    /// Validate all aspects of a file and return the kind it was validated as.
    pub fn validate_file(&self, file: &LocalFile) -> Result<ResourceKind, ValidationError> {
        let kind = ResourceKind::from_mime(&file.mime_type)
            .ok_or_else(|| ValidationError::UnsupportedMediaType(file.mime_type.clone()))?;
        self.validate_file_size(kind, file.size())?;
        self.validate_content_type(kind, &file.mime_type)?;
        self.validate_extension_content_type_match(&file.name, &file.mime_type)?;
        Ok(kind)
    }
}
