use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt::{Display, Formatter, Result as FmtResult};
use validator::Validate;

use super::resource::{ResourceDescriptor, ResourceId};

/// Segment of a video to keep, in milliseconds from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimRange {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TrimRange {
    pub fn new(start_ms: u64, end_ms: u64) -> Result<Self, String> {
        if end_ms <= start_ms {
            return Err(format!(
                "trim end ({} ms) must be after trim start ({} ms)",
                end_ms, start_ms
            ));
        }
        Ok(Self { start_ms, end_ms })
    }

    pub fn start_seconds(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn end_seconds(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.end_ms - self.start_ms) as f64 / 1000.0
    }
}

/// Crop rectangle in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CropParams {
    pub x: u32,
    pub y: u32,
    #[validate(range(min = 1))]
    pub width: u32,
    #[validate(range(min = 1))]
    pub height: u32,
}

/// Optional transformations requested at enqueue time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformFlags {
    pub trim: Option<TrimRange>,
    pub mute: bool,
    pub crop: Option<CropParams>,
    pub animated_gif: bool,
}

impl TransformFlags {
    pub fn wants_trim(&self) -> bool {
        self.trim.is_some()
    }

    pub fn wants_mute(&self) -> bool {
        self.mute
    }

    pub fn wants_crop(&self) -> bool {
        self.crop.is_some()
    }

    pub fn is_animated_gif(&self) -> bool {
        self.animated_gif
    }

    pub fn any(&self) -> bool {
        self.wants_trim() || self.wants_mute() || self.wants_crop() || self.is_animated_gif()
    }
}

/// Where a file handed to the uploader came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaSource {
    Editor,
    Recording,
    GifConversion,
    ImageConversion,
    VideoOptimization,
    PosterGeneration,
}

impl Display for MediaSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let value = match self {
            MediaSource::Editor => "editor",
            MediaSource::Recording => "recording",
            MediaSource::GifConversion => "gif-conversion",
            MediaSource::ImageConversion => "image-conversion",
            MediaSource::VideoOptimization => "video-optimization",
            MediaSource::PosterGeneration => "poster-generation",
        };
        f.write_str(value)
    }
}

/// Metadata accumulated across stages and forwarded to the uploader.
///
/// Values are merged by [`AdditionalData::merge`]; a later value wins,
/// absent values never erase earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_source: Option<MediaSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_id: Option<ResourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, JsonValue>,
}

impl AdditionalData {
    pub fn with_media_source(mut self, source: MediaSource) -> Self {
        self.media_source = Some(source);
        self
    }

    pub fn with_muted(mut self, muted: bool) -> Self {
        self.is_muted = Some(muted);
        self
    }

    pub fn with_trim(mut self, trim: TrimRange) -> Self {
        self.trim = Some(trim);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Copy hints carried by the incoming resource so they survive the
    /// resource being replaced later on. Values already present win.
    pub fn absorb_resource_hints(mut self, resource: &ResourceDescriptor) -> Self {
        if self.is_muted.is_none() && resource.is_muted {
            self.is_muted = Some(true);
        }
        if self.base_color.is_none() {
            self.base_color = resource.base_color.clone();
        }
        if self.blur_hash.is_none() {
            self.blur_hash = resource.blur_hash.clone();
        }
        if self.alt_text.is_none() {
            self.alt_text = resource.alt.clone();
        }
        self
    }

    pub fn merge(self, later: AdditionalData) -> AdditionalData {
        let mut extra = self.extra;
        extra.extend(later.extra);
        AdditionalData {
            media_source: later.media_source.or(self.media_source),
            is_muted: later.is_muted.or(self.is_muted),
            base_color: later.base_color.or(self.base_color),
            blur_hash: later.blur_hash.or(self.blur_hash),
            trim: later.trim.or(self.trim),
            original_id: later.original_id.or(self.original_id),
            alt_text: later.alt_text.or(self.alt_text),
            extra,
        }
    }
}
