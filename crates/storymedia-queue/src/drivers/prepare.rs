use std::sync::Arc;

use storymedia_core::models::{ItemId, ItemStage, ResourceKind};

use crate::context::PipelineContext;
use crate::item::{ItemPatch, QueueItem};

use super::upload;

/// Classify a freshly claimed item: route it to the transcode lock or
/// straight to its upload.
#[tracing::instrument(skip_all, fields(item.id = %id))]
pub(crate) async fn run(ctx: Arc<PipelineContext>, id: ItemId) {
    let Some(item) = ctx.current(id) else {
        return;
    };
    if item.stage != ItemStage::Preparing {
        return;
    }

    let already_optimized = is_already_optimized(&ctx, &item).await;
    if item.requires_transform(already_optimized) {
        ctx.transition(id, ItemStage::PendingTranscoding, ItemPatch::default());
        return;
    }

    if ctx
        .transition(id, ItemStage::Uploading, ItemPatch::default())
        .is_some()
    {
        upload::run(ctx, id).await;
    }
}

/// Only plain videos need the policy; a timeout counts as "not optimized".
async fn is_already_optimized(ctx: &PipelineContext, item: &QueueItem) -> bool {
    if item.resource.kind != ResourceKind::Video || item.flags.any() {
        return false;
    }

    let check = ctx
        .collaborators
        .optimization
        .is_already_optimized(&item.resource, &item.file);
    match ctx.timeout {
        Some(limit) => tokio::time::timeout(limit, check).await.unwrap_or(false),
        None => check.await,
    }
}
