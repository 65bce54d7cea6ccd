use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use storymedia_core::error::Operation;
use storymedia_core::hooks::PipelineEvent;
use storymedia_core::models::ItemId;
use storymedia_processing::image_dimensions;

use crate::context::PipelineContext;

/// Refine a placeholder video resource from its first frame.
///
/// Cosmetic work: every failure is swallowed and the item keeps its
/// placeholder. Holds the poster lock, never the transcode lock.
pub(crate) async fn run(ctx: Arc<PipelineContext>, id: ItemId, permit: OwnedSemaphorePermit) {
    refine(&ctx, id).await;
    drop(permit);
    ctx.wake.notify_one();
}

#[tracing::instrument(skip_all, fields(item.id = %id))]
async fn refine(ctx: &PipelineContext, id: ItemId) {
    let Some(item) = ctx.current(id) else {
        return;
    };
    if !item.resource.is_placeholder {
        return;
    }

    let Some(frame) = ctx
        .best_effort(
            id,
            Operation::ExtractFirstFrame,
            ctx.collaborators.transformer.extract_first_frame(&item.file),
        )
        .await
    else {
        return;
    };

    let Some((width, height)) = image_dimensions(&frame.data) else {
        tracing::debug!(frame = %frame.name, "Preview frame is not decodable, keeping placeholder");
        return;
    };

    if ctx
        .store
        .replace_placeholder_resource(id, width, height, Some(frame))
    {
        tracing::debug!(width, height, "Placeholder refined");
        ctx.events.track(PipelineEvent::PlaceholderRefined { item_id: id });
    }
}
