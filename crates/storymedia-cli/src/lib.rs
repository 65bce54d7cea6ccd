use std::path::Path;

use anyhow::{anyhow, Context, Result};

use storymedia_core::models::{CropParams, TrimRange};

/// Initialize tracing for the CLI.
///
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to
/// JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("storymedia=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Parse `START:END` in milliseconds.
pub fn parse_trim(value: &str) -> Result<TrimRange> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| anyhow!("Expected START:END in milliseconds, got '{}'", value))?;
    let start = start.trim().parse().context("Invalid trim start")?;
    let end = end.trim().parse().context("Invalid trim end")?;
    TrimRange::new(start, end).map_err(|e| anyhow!(e))
}

/// Parse `X,Y,WIDTH,HEIGHT` in pixels.
pub fn parse_crop(value: &str) -> Result<CropParams> {
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid crop '{}'", value))?;
    match parts.as_slice() {
        [x, y, width, height] => Ok(CropParams {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        }),
        _ => Err(anyhow!("Expected X,Y,WIDTH,HEIGHT, got '{}'", value)),
    }
}

/// Mime type for a local path, from its extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        _ => return None,
    };
    Some(mime)
}
