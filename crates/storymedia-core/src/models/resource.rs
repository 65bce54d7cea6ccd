use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Opaque resource identifier.
///
/// Locally generated ids are temporary and get replaced by the id the
/// backend issues once the upload succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh locally generated id.
    pub fn temporary() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Video,
    Gif,
    Audio,
}

impl ResourceKind {
    /// Guess the kind from a mime type. Unknown mime types yield `None`.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let normalized = mime_type.trim().to_lowercase();
        if normalized == "image/gif" {
            Some(ResourceKind::Gif)
        } else if normalized.starts_with("image/") {
            Some(ResourceKind::Image)
        } else if normalized.starts_with("video/") {
            Some(ResourceKind::Video)
        } else if normalized.starts_with("audio/") {
            Some(ResourceKind::Audio)
        } else {
            None
        }
    }

    pub fn is_visual(self) -> bool {
        !matches!(self, ResourceKind::Audio)
    }

    /// Kinds that travel through the video upload path (poster handling).
    pub fn is_video_like(self) -> bool {
        matches!(self, ResourceKind::Video | ResourceKind::Gif)
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ResourceKind::Image => write!(f, "image"),
            ResourceKind::Video => write!(f, "video"),
            ResourceKind::Gif => write!(f, "gif"),
            ResourceKind::Audio => write!(f, "audio"),
        }
    }
}

/// Description of a media asset, local or remote, and what is known about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub mime_type: String,
    /// True while only coarse or guessed metadata is known.
    pub is_placeholder: bool,
    /// Asset lives on a third-party host and is never transcoded.
    #[serde(default)]
    pub is_external: bool,
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_id: Option<ResourceId>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub is_muted: bool,
    #[serde(default)]
    pub is_optimized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur_hash: Option<String>,
}

impl ResourceDescriptor {
    /// Placeholder descriptor with nothing but a kind and mime type.
    pub fn placeholder(kind: ResourceKind, mime_type: impl Into<String>) -> Self {
        Self {
            id: ResourceId::default(),
            kind,
            mime_type: mime_type.into(),
            is_placeholder: true,
            is_external: false,
            src: String::new(),
            poster: None,
            poster_id: None,
            width: None,
            height: None,
            duration_seconds: None,
            is_muted: false,
            is_optimized: false,
            alt: None,
            base_color: None,
            blur_hash: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<ResourceId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = src.into();
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Mark the descriptor as carrying definite metadata.
    pub fn confirmed(mut self) -> Self {
        self.is_placeholder = false;
        self
    }

    pub fn has_poster(&self) -> bool {
        self.poster.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// HEIF/HEIC stills need conversion before any backend accepts them.
    pub fn is_heif(&self) -> bool {
        matches!(
            self.mime_type.to_lowercase().as_str(),
            "image/heic" | "image/heif" | "image/heic-sequence" | "image/heif-sequence"
        )
    }

    /// A non-placeholder descriptor must carry dimensions when it is visual.
    pub fn is_consistent(&self) -> bool {
        if self.is_placeholder || !self.kind.is_visual() {
            return true;
        }
        matches!((self.width, self.height), (Some(w), Some(h)) if w > 0 && h > 0)
    }
}
