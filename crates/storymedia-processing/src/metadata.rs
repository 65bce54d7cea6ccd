//! Local file introspection backed by the `image` crate.
//!
//! Decodable stills get their real dimensions and a confirmed descriptor.
//! Videos and formats the decoder does not understand (HEIF) stay
//! placeholders until a later stage refines them.

use async_trait::async_trait;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageReader};
use std::io::Cursor;

use storymedia_core::models::{LocalFile, ResourceDescriptor, ResourceId, ResourceKind};

use crate::traits::{LocalResource, ResourceIntrospector};

/// Width and height of an encoded still, if the format is decodable.
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// True when a GIF carries more than one frame.
pub fn is_animated_gif(data: &[u8]) -> bool {
    let Ok(decoder) = GifDecoder::new(Cursor::new(data)) else {
        return false;
    };
    decoder.into_frames().take(2).filter(|f| f.is_ok()).count() > 1
}

/// Default [`ResourceIntrospector`].
#[derive(Debug, Default, Clone)]
pub struct LocalResourceIntrospector;

impl LocalResourceIntrospector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResourceIntrospector for LocalResourceIntrospector {
    async fn resource_from_local_file(&self, file: &LocalFile) -> anyhow::Result<LocalResource> {
        let kind = ResourceKind::from_mime(&file.mime_type)
            .ok_or_else(|| anyhow::anyhow!("Unsupported mime type: {}", file.mime_type))?;

        let id = ResourceId::temporary();
        let mut resource = ResourceDescriptor::placeholder(kind, file.mime_type.clone())
            .with_id(id.clone())
            .with_src(format!("blob:{}", id));
        resource.alt = Some(file.name.clone());

        match kind {
            ResourceKind::Image | ResourceKind::Gif => {
                let data = file.data.clone();
                let dimensions = tokio::task::spawn_blocking(move || image_dimensions(&data))
                    .await
                    .map_err(|e| anyhow::anyhow!("Dimension probe panicked: {}", e))?;
                if let Some((width, height)) = dimensions {
                    resource = resource.with_dimensions(width, height).confirmed();
                } else {
                    tracing::debug!(
                        file = %file.name,
                        mime_type = %file.mime_type,
                        "Could not decode image dimensions, keeping placeholder"
                    );
                }
            }
            ResourceKind::Audio => {
                resource = resource.confirmed();
            }
            ResourceKind::Video => {}
        }

        Ok(LocalResource {
            resource,
            poster_file: None,
        })
    }
}
