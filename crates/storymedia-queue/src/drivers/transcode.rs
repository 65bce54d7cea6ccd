use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use storymedia_core::error::{Operation, PipelineResult};
use storymedia_core::models::{AdditionalData, ItemId, MediaSource};
use storymedia_processing::image_dimensions;

use crate::context::PipelineContext;
use crate::item::{ItemPatch, QueueItem, ResourceUpdate};

/// Drive one item through its transform stage while holding the
/// transcode lock.
///
/// The permit is released only after the item left its transcoding stage,
/// then the scheduler is woken to dispatch the next waiting item.
pub(crate) async fn run(ctx: Arc<PipelineContext>, id: ItemId, permit: OwnedSemaphorePermit) {
    execute(&ctx, id).await;
    drop(permit);
    ctx.wake.notify_one();
}

#[tracing::instrument(skip_all, fields(item.id = %id))]
async fn execute(ctx: &PipelineContext, id: ItemId) {
    let Some(item) = ctx.current(id) else {
        return;
    };
    let Some(done) = item.stage.completed() else {
        tracing::debug!(stage = %item.stage, "Item not in a transcoding stage, skipping");
        return;
    };

    let start = std::time::Instant::now();
    match transform(ctx, &item).await {
        Ok(patch) => {
            tracing::info!(
                stage = %item.stage,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Transform completed"
            );
            ctx.transition(id, done, patch);
        }
        Err(e) => ctx.fail(id, e),
    }
}

/// Run every planned operation in order, each on the previous output.
async fn transform(ctx: &PipelineContext, item: &QueueItem) -> PipelineResult<ItemPatch> {
    let transformer = &ctx.collaborators.transformer;
    let mut file = item.file.clone();
    let mut update = ResourceUpdate::default();
    let mut data = AdditionalData::default();
    let mut poster_file = None;

    for operation in item.planned_operations() {
        tracing::debug!(operation = %operation, file = %file.name, "Running transform");
        file = match operation {
            Operation::ConvertHeif => {
                let output = ctx
                    .call(operation, transformer.convert_heif(&file, &ctx.heif_target_mime))
                    .await?;
                if let Some((width, height)) = image_dimensions(&output.data) {
                    update.width = Some(width);
                    update.height = Some(height);
                }
                data.media_source = Some(MediaSource::ImageConversion);
                output
            }
            Operation::ConvertGif => {
                let output = ctx
                    .call(operation, transformer.convert_gif_to_video(&file))
                    .await?;
                update.is_muted = Some(true);
                data.media_source = Some(MediaSource::GifConversion);
                data.is_muted = Some(true);
                output
            }
            Operation::Trim => match item.flags.trim {
                Some(range) => {
                    let output = ctx.call(operation, transformer.trim_video(&file, range)).await?;
                    update.duration_seconds = Some(range.duration_seconds());
                    data.trim = Some(range);
                    output
                }
                None => file,
            },
            Operation::Mute => {
                let output = ctx.call(operation, transformer.mute_video(&file)).await?;
                update.is_muted = Some(true);
                data.is_muted = Some(true);
                output
            }
            Operation::Crop => match item.flags.crop {
                Some(params) => {
                    let output = ctx
                        .call(operation, transformer.crop_video(&file, &params))
                        .await?;
                    update.width = Some(params.width);
                    update.height = Some(params.height);
                    // The old poster shows the uncropped frame.
                    poster_file = ctx
                        .best_effort(
                            item.id,
                            Operation::ExtractFirstFrame,
                            transformer.extract_first_frame(&output),
                        )
                        .await;
                    output
                }
                None => file,
            },
            Operation::Optimize => {
                let output = ctx.call(operation, transformer.optimize_video(&file)).await?;
                update.is_optimized = Some(true);
                if item.additional_data.media_source != Some(MediaSource::Recording) {
                    data.media_source = Some(MediaSource::VideoOptimization);
                }
                output
            }
            other => {
                tracing::warn!(operation = %other, "Not a transform operation, ignoring");
                file
            }
        };
    }

    update.mime_type = Some(file.mime_type.clone());
    let mut patch = ItemPatch::default()
        .with_file(file)
        .with_resource_update(update)
        .with_additional_data(data);
    if let Some(poster_file) = poster_file {
        patch = patch.with_poster_file(poster_file);
    }
    Ok(patch)
}
