//! FFmpeg-backed [`MediaTransformer`].
//!
//! Every operation writes the input to a temp file, runs one ffmpeg
//! invocation and reads the output back.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use storymedia_core::models::{CropParams, LocalFile, TrimRange};

use crate::traits::MediaTransformer;

const MP4_MIME: &str = "video/mp4";
const JPEG_MIME: &str = "image/jpeg";

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        "image/heif" => Some("heif"),
        _ => None,
    }
}

pub(crate) fn heif_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        path_arg(input),
        "-frames:v".to_string(),
        "1".to_string(),
        path_arg(output),
    ]
}

pub(crate) fn gif_to_video_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        path_arg(input),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-vf".to_string(),
        "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
        "-an".to_string(),
        path_arg(output),
    ]
}

pub(crate) fn trim_args(input: &Path, output: &Path, range: TrimRange) -> Vec<String> {
    vec![
        "-i".to_string(),
        path_arg(input),
        "-ss".to_string(),
        format!("{:.3}", range.start_seconds()),
        "-to".to_string(),
        format!("{:.3}", range.end_seconds()),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        path_arg(output),
    ]
}

pub(crate) fn mute_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        path_arg(input),
        "-c:v".to_string(),
        "copy".to_string(),
        "-an".to_string(),
        path_arg(output),
    ]
}

pub(crate) fn crop_args(input: &Path, output: &Path, params: &CropParams) -> Vec<String> {
    vec![
        "-i".to_string(),
        path_arg(input),
        "-vf".to_string(),
        format!(
            "crop={}:{}:{}:{}",
            params.width, params.height, params.x, params.y
        ),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
        path_arg(output),
    ]
}

pub(crate) fn optimize_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        path_arg(input),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-profile:v".to_string(),
        "main".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-vf".to_string(),
        "scale='min(1920,iw)':-2".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        path_arg(output),
    ]
}

pub(crate) fn first_frame_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        path_arg(input),
        "-frames:v".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        "2".to_string(),
        path_arg(output),
    ]
}

pub struct FfmpegTransformer {
    ffmpeg_path: String,
}

impl FfmpegTransformer {
    pub fn new(ffmpeg_path: String) -> Result<Self> {
        let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
        if ffmpeg_path.chars().any(|c| dangerous_chars.contains(&c)) {
            return Err(anyhow!("Invalid ffmpeg_path: contains dangerous characters"));
        }

        Ok(Self { ffmpeg_path })
    }

    /// Run one ffmpeg invocation from `file` into a new file of `output_mime`.
    async fn run<F>(&self, file: &LocalFile, output_mime: &str, build_args: F) -> Result<LocalFile>
    where
        F: FnOnce(&Path, &Path) -> Vec<String>,
    {
        let input_ext = file
            .extension()
            .or_else(|| extension_for_mime(&file.mime_type).map(String::from))
            .unwrap_or_else(|| "bin".to_string());
        let output_ext = extension_for_mime(output_mime)
            .ok_or_else(|| anyhow!("No output extension for {}", output_mime))?;

        let input_temp = tempfile::Builder::new()
            .suffix(&format!(".{}", input_ext))
            .tempfile()
            .context("Failed to create input temp file")?;
        tokio::fs::write(input_temp.path(), &file.data)
            .await
            .context("Failed to write input temp file")?;

        let output_temp = tempfile::Builder::new()
            .suffix(&format!(".{}", output_ext))
            .tempfile()
            .context("Failed to create output temp file")?;

        let mut args = vec!["-y".to_string(), "-hide_banner".to_string()];
        args.extend(build_args(input_temp.path(), output_temp.path()));

        tracing::debug!(file = %file.name, output_mime = %output_mime, "Running ffmpeg");

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to execute ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("FFmpeg failed: {}", stderr));
        }

        let data = tokio::fs::read(output_temp.path())
            .await
            .context("Failed to read ffmpeg output")?;
        if data.is_empty() {
            return Err(anyhow!("FFmpeg produced an empty file"));
        }

        Ok(LocalFile::new(
            file.renamed_with_extension(output_ext),
            output_mime,
            data,
        ))
    }
}

#[async_trait]
impl MediaTransformer for FfmpegTransformer {
    async fn convert_heif(&self, file: &LocalFile, target_mime: &str) -> Result<LocalFile> {
        self.run(file, target_mime, heif_args).await
    }

    async fn convert_gif_to_video(&self, file: &LocalFile) -> Result<LocalFile> {
        self.run(file, MP4_MIME, gif_to_video_args).await
    }

    async fn trim_video(&self, file: &LocalFile, range: TrimRange) -> Result<LocalFile> {
        self.run(file, MP4_MIME, |i, o| trim_args(i, o, range)).await
    }

    async fn mute_video(&self, file: &LocalFile) -> Result<LocalFile> {
        self.run(file, MP4_MIME, mute_args).await
    }

    async fn crop_video(&self, file: &LocalFile, params: &CropParams) -> Result<LocalFile> {
        self.run(file, MP4_MIME, |i, o| crop_args(i, o, params)).await
    }

    async fn optimize_video(&self, file: &LocalFile) -> Result<LocalFile> {
        self.run(file, MP4_MIME, optimize_args).await
    }

    async fn extract_first_frame(&self, file: &LocalFile) -> Result<LocalFile> {
        self.run(file, JPEG_MIME, first_frame_args).await
    }
}
