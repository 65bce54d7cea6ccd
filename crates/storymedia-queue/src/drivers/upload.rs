use std::sync::Arc;

use storymedia_core::error::{Operation, PipelineResult};
use storymedia_core::models::{
    AdditionalData, ItemId, ItemStage, MediaSource, ResourceDescriptor, ResourceId, ResourceKind,
};
use storymedia_processing::{image_dimensions, UploadMetadata};

use crate::context::PipelineContext;
use crate::item::{ItemPatch, QueueItem};

/// Upload the item's current file and move it to `Uploaded`.
///
/// Uploads take no lock; any number may run next to each other and next to
/// the transcode lock holder.
#[tracing::instrument(skip_all, fields(item.id = %id))]
pub(crate) async fn run(ctx: Arc<PipelineContext>, id: ItemId) {
    let Some(item) = ctx.current(id) else {
        return;
    };
    if item.stage != ItemStage::Uploading {
        return;
    }

    let start = std::time::Instant::now();
    match upload(&ctx, &item).await {
        Ok(resource) => {
            tracing::info!(
                resource.id = %resource.id,
                previous_resource.id = %item.resource.id,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Upload completed"
            );
            ctx.transition(
                id,
                ItemStage::Uploaded,
                ItemPatch::default()
                    .with_resource(resource)
                    .with_previous_resource_id(item.resource.id.clone()),
            );
        }
        Err(e) => ctx.fail(id, e),
    }
}

async fn upload(ctx: &PipelineContext, item: &QueueItem) -> PipelineResult<ResourceDescriptor> {
    let metadata = UploadMetadata::for_resource(
        &item.resource,
        item.batch_id,
        item.additional_data.clone(),
    );
    let mut resource = ctx
        .call(
            Operation::Upload,
            ctx.collaborators.uploader.upload_file(&item.file, &metadata),
        )
        .await?;

    if item.resource.kind.is_video_like() {
        attach_poster(ctx, item, &mut resource).await;
    }

    Ok(resource)
}

/// Upload a poster frame for a video and link it to `resource`.
///
/// Every step is best effort. When the poster cannot be uploaded the
/// previously known poster is kept.
async fn attach_poster(ctx: &PipelineContext, item: &QueueItem, resource: &mut ResourceDescriptor) {
    let mut poster_file = item.poster_file.clone();
    if poster_file.is_none() && !resource.has_poster() {
        poster_file = ctx
            .best_effort(
                item.id,
                Operation::ExtractFirstFrame,
                ctx.collaborators.transformer.extract_first_frame(&item.file),
            )
            .await;
    }
    let Some(poster_file) = poster_file else {
        return;
    };

    let mut poster_resource =
        ResourceDescriptor::placeholder(ResourceKind::Image, poster_file.mime_type.clone())
            .with_id(ResourceId::temporary());
    if let Some((width, height)) = image_dimensions(&poster_file.data) {
        poster_resource = poster_resource.with_dimensions(width, height);
    }
    let metadata = UploadMetadata::for_resource(
        &poster_resource,
        item.batch_id,
        AdditionalData::default().with_media_source(MediaSource::PosterGeneration),
    );

    let uploaded = ctx
        .best_effort(
            item.id,
            Operation::PosterUpload,
            ctx.collaborators.uploader.upload_file(&poster_file, &metadata),
        )
        .await;

    match uploaded {
        Some(poster) => {
            resource.poster = Some(poster.src);
            resource.poster_id = Some(poster.id);
        }
        None if !resource.has_poster() => {
            resource.poster = item.resource.poster.clone();
            resource.poster_id = item.resource.poster_id.clone();
        }
        None => {}
    }
}
