//! Configuration module
//!
//! Settings for validation limits, collaborator timeouts and the local
//! collaborators used by the CLI. Loaded from the environment (and `.env`).

use std::env;
use std::time::Duration;

const MAX_IMAGE_SIZE_MB: usize = 50;
const MAX_VIDEO_SIZE_MB: usize = 1024;
const MAX_AUDIO_SIZE_MB: usize = 100;
const HEIF_TARGET_MIME: &str = "image/jpeg";
const COLLABORATOR_TIMEOUT_SECS: u64 = 0;
const IMAGE_CONTENT_TYPES: &str = "image/jpeg,image/png,image/gif,image/webp,image/heic,image/heif";
const VIDEO_CONTENT_TYPES: &str = "video/mp4,video/webm,video/quicktime";
const AUDIO_CONTENT_TYPES: &str = "audio/mpeg,audio/mp4,audio/aac,audio/wav,audio/ogg";

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub environment: String,
    pub max_image_size_bytes: usize,
    pub max_video_size_bytes: usize,
    pub max_audio_size_bytes: usize,
    pub image_allowed_content_types: Vec<String>,
    pub video_allowed_content_types: Vec<String>,
    pub audio_allowed_content_types: Vec<String>,
    /// Mime type HEIF/HEIC inputs are converted to.
    pub heif_target_mime: String,
    /// Upper bound for a single collaborator call. 0 = no timeout.
    pub collaborator_timeout_secs: u64,
    pub ffmpeg_path: String,
    pub upload_dir: String,
    pub upload_base_url: String,
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            max_image_size_bytes: MAX_IMAGE_SIZE_MB * 1024 * 1024,
            max_video_size_bytes: MAX_VIDEO_SIZE_MB * 1024 * 1024,
            max_audio_size_bytes: MAX_AUDIO_SIZE_MB * 1024 * 1024,
            image_allowed_content_types: parse_list(IMAGE_CONTENT_TYPES),
            video_allowed_content_types: parse_list(VIDEO_CONTENT_TYPES),
            audio_allowed_content_types: parse_list(AUDIO_CONTENT_TYPES),
            heif_target_mime: HEIF_TARGET_MIME.to_string(),
            collaborator_timeout_secs: COLLABORATOR_TIMEOUT_SECS,
            ffmpeg_path: "ffmpeg".to_string(),
            upload_dir: "./uploads".to_string(),
            upload_base_url: "http://localhost:8080/uploads".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or(defaults.environment),
            max_image_size_bytes: env::var("MAX_IMAGE_SIZE_MB")
                .unwrap_or_else(|_| MAX_IMAGE_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_IMAGE_SIZE_MB)
                * 1024
                * 1024,
            max_video_size_bytes: env::var("MAX_VIDEO_SIZE_MB")
                .unwrap_or_else(|_| MAX_VIDEO_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_VIDEO_SIZE_MB)
                * 1024
                * 1024,
            max_audio_size_bytes: env::var("MAX_AUDIO_SIZE_MB")
                .unwrap_or_else(|_| MAX_AUDIO_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_AUDIO_SIZE_MB)
                * 1024
                * 1024,
            image_allowed_content_types: parse_list(
                &env::var("IMAGE_ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| IMAGE_CONTENT_TYPES.to_string()),
            ),
            video_allowed_content_types: parse_list(
                &env::var("VIDEO_ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| VIDEO_CONTENT_TYPES.to_string()),
            ),
            audio_allowed_content_types: parse_list(
                &env::var("AUDIO_ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|_| AUDIO_CONTENT_TYPES.to_string()),
            ),
            heif_target_mime: env::var("HEIF_TARGET_MIME")
                .unwrap_or_else(|_| HEIF_TARGET_MIME.to_string())
                .trim()
                .to_lowercase(),
            collaborator_timeout_secs: env::var("COLLABORATOR_TIMEOUT_SECS")
                .unwrap_or_else(|_| COLLABORATOR_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(COLLABORATOR_TIMEOUT_SECS),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            upload_base_url: env::var("UPLOAD_BASE_URL").unwrap_or(defaults.upload_base_url),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_image_size_bytes == 0
            || self.max_video_size_bytes == 0
            || self.max_audio_size_bytes == 0
        {
            return Err(anyhow::anyhow!("Maximum file sizes must be greater than zero"));
        }

        if self.image_allowed_content_types.is_empty()
            || self.video_allowed_content_types.is_empty()
            || self.audio_allowed_content_types.is_empty()
        {
            return Err(anyhow::anyhow!(
                "Allowed content type lists must not be empty"
            ));
        }

        if !self.heif_target_mime.starts_with("image/") {
            return Err(anyhow::anyhow!(
                "HEIF_TARGET_MIME must be an image mime type, got '{}'",
                self.heif_target_mime
            ));
        }

        let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
        if self.ffmpeg_path.chars().any(|c| dangerous_chars.contains(&c)) {
            return Err(anyhow::anyhow!(
                "FFMPEG_PATH contains dangerous characters"
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn collaborator_timeout(&self) -> Option<Duration> {
        match self.collaborator_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
